#![warn(missing_docs)]

//! Stacked laser-cut layer generation.
//!
//! Slices a mesh into horizontal layers sized to a sheet-material
//! thickness: each layer is a closed 2D outline plus an extruded slab
//! solid, stackable into a physical approximation of the model. The
//! engine tracks live transform edits and reslices after a debounce
//! quiet period.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use lamina_geom::{concave_hull, extrude_ring, simplify, smooth_ring, triangles_plane_intersection, PlaneBasis};
use lamina_math::{Plane, Point2, Transform};
use lamina_mesh::TriangleMesh;

pub mod debounce;

pub use debounce::Debounce;

/// Fewest layers a model is split into, however thick the sheet.
pub const MIN_LAYER_COUNT: usize = 3;
/// Most layers generated in one pass.
pub const MAX_LAYER_COUNT: usize = 50;
/// Canvas-margin origin the flat export outlines are shifted to.
pub const EXPORT_ORIGIN: (f64, f64) = (10.0, 10.0);

/// Errors from the stacked-layer engine.
#[derive(Error, Debug)]
pub enum LayerError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Model has no vertical extent to slice.
    #[error("model height is zero")]
    FlatModel,

    /// Invalid layer settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Export requested before any shapes were generated.
    #[error("no layer shapes have been generated")]
    NoShapes,
}

/// Result type for layer operations.
pub type Result<T> = std::result::Result<T, LayerError>;

/// Stacked-layer generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSettings {
    /// Sheet material thickness in mm. Drives both the slab thickness
    /// and the layer count.
    pub material_thickness: f64,
    /// Concave-hull threshold for layer outlines (mm).
    pub concavity: f64,
    /// Douglas–Peucker tolerance applied to outlines (0 = off).
    pub simplify_tolerance: f64,
    /// Laplacian smoothing factor in [0, 1] (0 = off).
    pub smoothing: f64,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            material_thickness: 3.0,
            concavity: 30.0,
            simplify_tolerance: 0.0,
            smoothing: 0.0,
        }
    }
}

impl LayerSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.material_thickness <= 0.0 {
            return Err(LayerError::InvalidSettings(
                "material_thickness must be positive".into(),
            ));
        }
        if self.concavity <= 0.0 {
            return Err(LayerError::InvalidSettings(
                "concavity must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(LayerError::InvalidSettings(
                "smoothing must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

/// One stacked-layer artifact.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer index, bottom to top.
    pub index: usize,
    /// World Y of the cutting plane.
    pub y: f64,
    /// Closed outline ring in plane coordinates.
    pub outline: Vec<Point2>,
    /// Frame of the cutting plane (for flat export and re-extrusion).
    pub basis: PlaneBasis,
    /// Slab thickness (= material thickness).
    pub thickness: f64,
    /// Extruded slab solid, centered on the cutting plane.
    pub solid: TriangleMesh,
}

/// Derive the layer count and spacing from the model height.
///
/// `layer_count = clamp(floor(height / thickness), 3, 50)`; spacing is
/// the height divided by that count. Changing material thickness thus
/// changes slab thickness and slice count together.
pub fn layer_plan(model_height: f64, material_thickness: f64) -> (usize, f64) {
    let raw = (model_height / material_thickness).floor() as isize;
    let count = (raw.max(0) as usize).clamp(MIN_LAYER_COUNT, MAX_LAYER_COUNT);
    (count, model_height / count as f64)
}

/// Slice `mesh` (under `transform`) into stacked layers.
///
/// Cut planes sit at the center of each slab (`min_y + (i + 0.5) *
/// spacing`), so every plane is interior to the model's Y extent.
/// Layers whose cut yields fewer than 3 usable intersection points are
/// skipped — a degenerate-geometry outcome, not an error.
pub fn generate_layers(
    mesh: &TriangleMesh,
    transform: &Transform,
    settings: &LayerSettings,
) -> Result<Vec<Layer>> {
    settings.validate()?;
    let (min, max) = mesh
        .bounds_transformed(transform)
        .ok_or(LayerError::EmptyMesh)?;
    let height = max.y - min.y;
    if height <= 0.0 {
        return Err(LayerError::FlatModel);
    }

    let (count, spacing) = layer_plan(height, settings.material_thickness);
    info!(count, spacing, height, "generating stacked layers");

    let triangles = mesh.world_triangles(transform);

    let layers: Vec<Layer> = (0..count)
        .into_par_iter()
        .filter_map(|i| {
            let y = min.y + (i as f64 + 0.5) * spacing;
            let plane = Plane::horizontal(y);
            let points = triangles_plane_intersection(&triangles, &plane);
            if points.len() < 3 {
                debug!(layer = i, y, "skipping layer with degenerate section");
                return None;
            }

            let basis = PlaneBasis::new(&plane);
            let flat = basis.project_all(&points);
            let mut outline = concave_hull(&flat, settings.concavity);
            if settings.simplify_tolerance > 0.0 {
                outline = simplify(&outline, settings.simplify_tolerance);
            }
            if settings.smoothing > 0.0 {
                outline = smooth_ring(&outline, settings.smoothing);
            }
            if outline.len() < 4 {
                debug!(layer = i, y, "skipping layer with degenerate outline");
                return None;
            }

            let solid = match extrude_ring(&outline, &basis, settings.material_thickness) {
                Ok(solid) => solid,
                Err(err) => {
                    debug!(layer = i, %err, "skipping unextrudable layer");
                    return None;
                }
            };

            Some(Layer {
                index: i,
                y,
                outline,
                basis,
                thickness: settings.material_thickness,
                solid,
            })
        })
        .collect();

    Ok(layers)
}

/// Flat 2D export payload for one layer, handed to the vector sink.
#[derive(Debug, Clone, Serialize)]
pub struct LayerOutline {
    /// Layer index.
    pub layer_index: usize,
    /// Material thickness annotation.
    pub material_thickness: f64,
    /// Closed outline ring, shifted to the export canvas origin.
    pub points: Vec<(f64, f64)>,
}

/// Stacked-layer engine state machine: Idle until a generate command,
/// Active while a layer set exists.
#[derive(Debug, Default)]
pub struct LayerStack {
    active: Option<ActiveLayers>,
    debounce: Debounce,
}

#[derive(Debug)]
struct ActiveLayers {
    source_id: String,
    settings: LayerSettings,
    layers: Vec<Layer>,
}

impl LayerStack {
    /// New idle engine with the default debounce window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a layer set currently active?
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Object id the active layer set was generated from.
    pub fn source_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.source_id.as_str())
    }

    /// Generated layers of the active set.
    pub fn layers(&self) -> &[Layer] {
        self.active.as_ref().map_or(&[], |a| a.layers.as_slice())
    }

    /// Generate a fresh layer set, replacing any previous one.
    pub fn generate(
        &mut self,
        source_id: &str,
        mesh: &TriangleMesh,
        transform: &Transform,
        settings: LayerSettings,
    ) -> Result<usize> {
        let layers = generate_layers(mesh, transform, &settings)?;
        let n = layers.len();
        self.active = Some(ActiveLayers {
            source_id: source_id.to_string(),
            settings,
            layers,
        });
        Ok(n)
    }

    /// A transform edit landed on the source object: arm the debounce
    /// instead of reslicing inline.
    pub fn note_transform_edit(&mut self, now: std::time::Instant) {
        if self.active.is_some() {
            self.debounce.trigger(now);
        }
    }

    /// True when the quiet period has elapsed and a reslice is owed.
    ///
    /// At most one reslice fires per quiescent window; edits arriving
    /// while a reslice runs re-arm the window (queue-depth-1).
    pub fn regenerate_due(&mut self, now: std::time::Instant) -> bool {
        self.active.is_some() && self.debounce.fire_due(now)
    }

    /// Rebuild the active layer set against the current transform.
    pub fn regenerate(&mut self, mesh: &TriangleMesh, transform: &Transform) -> Result<usize> {
        let active = self.active.as_mut().ok_or(LayerError::NoShapes)?;
        let layers = generate_layers(mesh, transform, &active.settings)?;
        let n = layers.len();
        active.layers = layers;
        info!(count = n, "regenerated stacked layers");
        Ok(n)
    }

    /// Flat 2D outlines for the vector sink, one per retained shape.
    pub fn export_outlines(&self) -> Result<Vec<LayerOutline>> {
        let active = self.active.as_ref().ok_or(LayerError::NoShapes)?;
        if active.layers.is_empty() {
            return Err(LayerError::NoShapes);
        }
        Ok(active.layers.iter().map(outline_payload).collect())
    }

    /// Discard the layer set and return to Idle. Returns the disposed
    /// layers so the caller can drop their scene objects.
    pub fn clear(&mut self) -> Vec<Layer> {
        self.debounce.cancel();
        self.active.take().map(|a| a.layers).unwrap_or_default()
    }
}

fn outline_payload(layer: &Layer) -> LayerOutline {
    let min_x = layer
        .outline
        .iter()
        .map(|p| p.x)
        .fold(f64::MAX, f64::min);
    let min_y = layer
        .outline
        .iter()
        .map(|p| p.y)
        .fold(f64::MAX, f64::min);
    LayerOutline {
        layer_index: layer.index,
        material_thickness: layer.thickness,
        points: layer
            .outline
            .iter()
            .map(|p| (p.x - min_x + EXPORT_ORIGIN.0, p.y - min_y + EXPORT_ORIGIN.1))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lamina_mesh::cube_mesh;
    use std::time::{Duration, Instant};

    #[test]
    fn cube_30_at_thickness_3_gives_10_layers() {
        let mesh = cube_mesh(30.0);
        let settings = LayerSettings {
            material_thickness: 3.0,
            ..Default::default()
        };
        let layers = generate_layers(&mesh, &Transform::identity(), &settings).unwrap();
        assert_eq!(layers.len(), 10);
        for (i, layer) in layers.iter().enumerate() {
            assert_eq!(layer.index, i);
            // Closed quadrilateral: 4 corners + closing repeat.
            assert_eq!(layer.outline.len(), 5);
            assert_eq!(layer.outline.first(), layer.outline.last());
            assert!((layer.thickness - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn layer_plan_clamps() {
        assert_eq!(layer_plan(30.0, 3.0).0, 10);
        assert_eq!(layer_plan(4.0, 3.0).0, 3); // floor(1.33) = 1 -> min 3
        assert_eq!(layer_plan(1000.0, 1.0).0, 50); // capped
        let (count, spacing) = layer_plan(30.0, 3.0);
        assert!((spacing - 30.0 / count as f64).abs() < 1e-12);
    }

    #[test]
    fn solids_are_centered_on_the_cut_planes() {
        let mesh = cube_mesh(30.0);
        let settings = LayerSettings {
            material_thickness: 3.0,
            ..Default::default()
        };
        let layers = generate_layers(&mesh, &Transform::identity(), &settings).unwrap();
        let first = &layers[0];
        let (min, max) = first.solid.bounds().unwrap();
        assert_relative_eq!(min.y, first.y - 1.5, epsilon = 1e-6);
        assert_relative_eq!(max.y, first.y + 1.5, epsilon = 1e-6);
    }

    #[test]
    fn transformed_mesh_slices_in_world_space() {
        let mesh = cube_mesh(30.0);
        let lifted = Transform::translation(0.0, 100.0, 0.0);
        let settings = LayerSettings {
            material_thickness: 3.0,
            ..Default::default()
        };
        let layers = generate_layers(&mesh, &lifted, &settings).unwrap();
        assert_eq!(layers.len(), 10);
        assert!(layers[0].y > 100.0);
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = LayerSettings {
            material_thickness: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            generate_layers(&cube_mesh(10.0), &Transform::identity(), &settings),
            Err(LayerError::InvalidSettings(_))
        ));
    }

    #[test]
    fn export_requires_generated_shapes() {
        let mut stack = LayerStack::new();
        assert!(matches!(stack.export_outlines(), Err(LayerError::NoShapes)));

        stack
            .generate(
                "cube",
                &cube_mesh(30.0),
                &Transform::identity(),
                LayerSettings::default(),
            )
            .unwrap();
        let outlines = stack.export_outlines().unwrap();
        assert_eq!(outlines.len(), 10);
        for outline in &outlines {
            let min_x = outline.points.iter().map(|p| p.0).fold(f64::MAX, f64::min);
            let min_y = outline.points.iter().map(|p| p.1).fold(f64::MAX, f64::min);
            assert!((min_x - EXPORT_ORIGIN.0).abs() < 1e-9);
            assert!((min_y - EXPORT_ORIGIN.1).abs() < 1e-9);
            assert!((outline.material_thickness - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn clear_returns_to_idle() {
        let mut stack = LayerStack::new();
        stack
            .generate(
                "cube",
                &cube_mesh(30.0),
                &Transform::identity(),
                LayerSettings::default(),
            )
            .unwrap();
        assert!(stack.is_active());
        let disposed = stack.clear();
        assert_eq!(disposed.len(), 10);
        assert!(!stack.is_active());
        assert!(stack.clear().is_empty());
    }

    #[test]
    fn transform_edits_debounce_into_one_regenerate() {
        let mut stack = LayerStack::new();
        let mesh = cube_mesh(30.0);
        stack
            .generate("cube", &mesh, &Transform::identity(), LayerSettings::default())
            .unwrap();

        let t0 = Instant::now();
        // Slider drag: a burst of edits inside the quiet window.
        stack.note_transform_edit(t0);
        stack.note_transform_edit(t0 + Duration::from_millis(50));
        stack.note_transform_edit(t0 + Duration::from_millis(100));

        // Not yet quiet.
        assert!(!stack.regenerate_due(t0 + Duration::from_millis(150)));
        // Quiet period elapsed since the LAST edit: exactly one fire.
        let due_at = t0 + Duration::from_millis(100) + debounce::DEFAULT_DELAY;
        assert!(stack.regenerate_due(due_at));
        assert!(!stack.regenerate_due(due_at + Duration::from_millis(1)));

        // The regenerate itself uses the latest transform.
        let moved = Transform::translation(0.0, 5.0, 0.0);
        let n = stack.regenerate(&mesh, &moved).unwrap();
        assert_eq!(n, 10);
        assert!(stack.layers()[0].y > 5.0);
    }

    #[test]
    fn edits_while_idle_never_fire() {
        let mut stack = LayerStack::new();
        let t0 = Instant::now();
        stack.note_transform_edit(t0);
        assert!(!stack.regenerate_due(t0 + Duration::from_secs(10)));
    }
}
