#![warn(missing_docs)]

//! Wire-lattice generation.
//!
//! Slices a mesh along horizontal and vertical plane families to build a
//! truss of closed contour "wires", each displayable as a polyline or
//! thickened into a tube solid. Two modes share the kernel: bulk
//! generation from wire counts, and an incremental session where wires
//! are added one at a time and later collected into one artifact.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use lamina_geom::{concave_hull, sample_closed_curve, triangles_plane_intersection, tube_mesh, GeomError, PlaneBasis};
use lamina_math::{Plane, Point3, Transform};
use lamina_mesh::TriangleMesh;

/// Concave-hull threshold used for wire contours (mm).
pub const WIRE_CONCAVITY: f64 = 20.0;
/// Catmull–Rom samples per ring span when sweeping tubes.
pub const TUBE_SAMPLES_PER_SPAN: usize = 4;
/// Circle segments of the swept tube profile.
pub const TUBE_RADIAL_SEGMENTS: usize = 8;

/// Errors from the wire-mesh engine.
#[derive(Error, Debug)]
pub enum WireError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Invalid wire settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Tube construction failed on a degenerate ring.
    #[error("tube construction failed: {0}")]
    Tube(#[from] GeomError),
}

/// Result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Which plane family a wire was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireOrientation {
    /// Cut by a horizontal plane (constant Y).
    Horizontal,
    /// Cut by a vertical plane (constant Z).
    Vertical,
}

/// One strand of the lattice: a closed contour ring in world space.
#[derive(Debug, Clone)]
pub struct Wire {
    /// Plane family this wire belongs to.
    pub orientation: WireOrientation,
    /// Cut position along the family axis.
    pub position: f64,
    /// Wire thickness (tube diameter) in mm.
    pub thickness: f64,
    /// Display color.
    pub color: String,
    /// Closed contour ring (first point repeated at the end).
    pub ring: Vec<Point3>,
    /// Polyline representation; false once converted to a tube.
    pub is_line: bool,
}

impl Wire {
    /// Build the tube solid for this wire (diameter = `thickness`).
    pub fn build_tube(&self) -> Result<TriangleMesh> {
        // Drop the closing duplicate; the swept curve closes implicitly.
        let open = &self.ring[..self.ring.len() - 1];
        let path = sample_closed_curve(open, TUBE_SAMPLES_PER_SPAN);
        Ok(tube_mesh(&path, self.thickness / 2.0, TUBE_RADIAL_SEGMENTS)?)
    }
}

/// Bulk lattice parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSettings {
    /// Number of horizontal wires (across the Y extent).
    pub h_count: u32,
    /// Number of vertical wires (across the Z extent).
    pub v_count: u32,
    /// Wire thickness in mm.
    pub thickness: f64,
    /// Build tube solids instead of polylines.
    pub use_tubes: bool,
    /// Concave-hull threshold (mm).
    pub concavity: f64,
    /// Color applied to every bulk wire.
    pub color: String,
}

impl Default for WireSettings {
    fn default() -> Self {
        Self {
            h_count: 8,
            v_count: 8,
            thickness: 1.0,
            use_tubes: false,
            concavity: WIRE_CONCAVITY,
            color: "#d8d8d8".to_string(),
        }
    }
}

impl WireSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.h_count == 0 && self.v_count == 0 {
            return Err(WireError::InvalidSettings(
                "at least one wire is required".into(),
            ));
        }
        if self.thickness <= 0.0 {
            return Err(WireError::InvalidSettings(
                "thickness must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Cut one closed wire ring out of pre-transformed world triangles.
///
/// Returns `None` when the plane yields fewer than 3 intersection
/// points — a degenerate-geometry outcome, not an error.
fn cut_ring(triangles: &[[Point3; 3]], plane: &Plane, concavity: f64) -> Option<Vec<Point3>> {
    let points = triangles_plane_intersection(triangles, plane);
    if points.len() < 3 {
        return None;
    }
    let basis = PlaneBasis::new(plane);
    let flat = basis.project_all(&points);
    let hull = concave_hull(&flat, concavity);
    if hull.len() < 4 {
        return None;
    }
    Some(basis.unproject_all(&hull))
}

/// Generate a full lattice: `h_count` horizontal wires evenly spaced
/// across the Y extent and `v_count` vertical wires across the Z
/// extent. Plane `k` of `n` sits at `min + extent * (k+1)/(n+1)`, so
/// every cut is interior. Degenerate wires are dropped silently.
pub fn generate_lattice(
    mesh: &TriangleMesh,
    transform: &Transform,
    settings: &WireSettings,
) -> Result<Vec<Wire>> {
    settings.validate()?;
    let (min, max) = mesh
        .bounds_transformed(transform)
        .ok_or(WireError::EmptyMesh)?;
    let triangles = mesh.world_triangles(transform);

    let mut wires = Vec::new();
    let y_extent = max.y - min.y;
    for k in 0..settings.h_count {
        let y = min.y + y_extent * (k as f64 + 1.0) / (settings.h_count as f64 + 1.0);
        match cut_ring(&triangles, &Plane::horizontal(y), settings.concavity) {
            Some(ring) => wires.push(Wire {
                orientation: WireOrientation::Horizontal,
                position: y,
                thickness: settings.thickness,
                color: settings.color.clone(),
                ring,
                is_line: !settings.use_tubes,
            }),
            None => debug!(y, "dropping degenerate horizontal wire"),
        }
    }

    let z_extent = max.z - min.z;
    for k in 0..settings.v_count {
        let z = min.z + z_extent * (k as f64 + 1.0) / (settings.v_count as f64 + 1.0);
        match cut_ring(&triangles, &Plane::vertical_z(z), settings.concavity) {
            Some(ring) => wires.push(Wire {
                orientation: WireOrientation::Vertical,
                position: z,
                thickness: settings.thickness,
                color: settings.color.clone(),
                ring,
                is_line: !settings.use_tubes,
            }),
            None => debug!(z, "dropping degenerate vertical wire"),
        }
    }

    info!(
        count = wires.len(),
        h = settings.h_count,
        v = settings.v_count,
        "generated wire lattice"
    );
    Ok(wires)
}

/// Incremental wire-mesh session: wires accumulate one at a time and
/// are collected into a single artifact at the end.
#[derive(Debug, Default)]
pub struct WireSession {
    wires: Vec<Wire>,
}

impl WireSession {
    /// Open an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires accumulated so far.
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Add one horizontal wire at world Y `position`.
    ///
    /// Returns whether a wire was actually added; a degenerate cut is
    /// dropped silently.
    pub fn add_horizontal_wire(
        &mut self,
        mesh: &TriangleMesh,
        transform: &Transform,
        position: f64,
        thickness: f64,
        color: &str,
    ) -> bool {
        self.add_wire(
            mesh,
            transform,
            WireOrientation::Horizontal,
            position,
            thickness,
            color,
        )
    }

    /// Add one vertical wire at world Z `position`.
    pub fn add_vertical_wire(
        &mut self,
        mesh: &TriangleMesh,
        transform: &Transform,
        position: f64,
        thickness: f64,
        color: &str,
    ) -> bool {
        self.add_wire(
            mesh,
            transform,
            WireOrientation::Vertical,
            position,
            thickness,
            color,
        )
    }

    fn add_wire(
        &mut self,
        mesh: &TriangleMesh,
        transform: &Transform,
        orientation: WireOrientation,
        position: f64,
        thickness: f64,
        color: &str,
    ) -> bool {
        let plane = match orientation {
            WireOrientation::Horizontal => Plane::horizontal(position),
            WireOrientation::Vertical => Plane::vertical_z(position),
        };
        let triangles = mesh.world_triangles(transform);
        match cut_ring(&triangles, &plane, WIRE_CONCAVITY) {
            Some(ring) => {
                self.wires.push(Wire {
                    orientation,
                    position,
                    thickness,
                    color: color.to_string(),
                    ring,
                    is_line: true,
                });
                true
            }
            None => {
                debug!(?orientation, position, "dropping degenerate wire");
                false
            }
        }
    }

    /// Retroactively turn every accumulated wire into a tube of the
    /// given diameter, replacing its polyline representation.
    pub fn convert_to_tubes(&mut self, thickness: f64) {
        for wire in &mut self.wires {
            wire.is_line = false;
            wire.thickness = thickness;
        }
    }

    /// Close the session, handing back the accumulated wires as one
    /// group.
    pub fn collect(self) -> Vec<Wire> {
        self.wires
    }
}

/// Ordered trace of a wire's ring for the tabular (CSV-like) sink,
/// rounded to 2 decimal places.
pub fn wire_trace(wire: &Wire) -> Vec<[f64; 3]> {
    wire.ring
        .iter()
        .map(|p| {
            [
                (p.x * 100.0).round() / 100.0,
                (p.y * 100.0).round() / 100.0,
                (p.z * 100.0).round() / 100.0,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lamina_mesh::cube_mesh;

    #[test]
    fn bulk_lattice_counts_and_rings() {
        let mesh = cube_mesh(10.0);
        let settings = WireSettings {
            h_count: 3,
            v_count: 2,
            ..Default::default()
        };
        let wires = generate_lattice(&mesh, &Transform::identity(), &settings).unwrap();
        assert_eq!(wires.len(), 5);

        let horizontal: Vec<_> = wires
            .iter()
            .filter(|w| w.orientation == WireOrientation::Horizontal)
            .collect();
        assert_eq!(horizontal.len(), 3);
        // Interior, evenly spaced cuts: 2.5, 5.0, 7.5.
        assert_relative_eq!(horizontal[0].position, 2.5);
        assert_relative_eq!(horizontal[1].position, 5.0);
        assert_relative_eq!(horizontal[2].position, 7.5);

        for wire in &wires {
            assert!(wire.is_line);
            assert_eq!(wire.ring.len(), 5);
            assert!((wire.ring[0] - wire.ring[4]).norm() < 1e-9);
        }
    }

    #[test]
    fn horizontal_wires_are_planar() {
        let mesh = cube_mesh(10.0);
        let settings = WireSettings {
            h_count: 2,
            v_count: 0,
            ..Default::default()
        };
        let wires = generate_lattice(&mesh, &Transform::identity(), &settings).unwrap();
        for wire in &wires {
            for p in &wire.ring {
                assert!((p.y - wire.position).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn degenerate_cuts_are_dropped_silently() {
        // A single triangle lying in the y = 0 plane has no Y extent:
        // every horizontal cut is tangent and contributes nothing.
        let flat = TriangleMesh {
            vertices: vec![0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0, 10.0],
            indices: Vec::new(),
            normals: Vec::new(),
        };
        let settings = WireSettings {
            h_count: 4,
            v_count: 0,
            ..Default::default()
        };
        let wires = generate_lattice(&flat, &Transform::identity(), &settings).unwrap();
        assert!(wires.is_empty());
    }

    #[test]
    fn session_convert_to_tubes_rewrites_representation() {
        let mesh = cube_mesh(10.0);
        let mut session = WireSession::new();
        assert!(session.add_horizontal_wire(&mesh, &Transform::identity(), 5.0, 1.0, "#ff0000"));
        assert!(session.wires()[0].is_line);

        session.convert_to_tubes(2.5);
        let wires = session.collect();
        assert_eq!(wires.len(), 1);
        assert!(!wires[0].is_line);
        assert!((wires[0].thickness - 2.5).abs() < 1e-12);
        assert_eq!(wires[0].color, "#ff0000");

        let tube = wires[0].build_tube().unwrap();
        assert!(tube.num_triangles() > 0);
    }

    #[test]
    fn session_drops_degenerate_positions() {
        let mesh = cube_mesh(10.0);
        let mut session = WireSession::new();
        // Cut plane far outside the cube.
        assert!(!session.add_horizontal_wire(&mesh, &Transform::identity(), 50.0, 1.0, "#fff"));
        assert!(session.wires().is_empty());
    }

    #[test]
    fn trace_rounds_to_two_decimals() {
        let wire = Wire {
            orientation: WireOrientation::Horizontal,
            position: 1.0,
            thickness: 1.0,
            color: "#fff".into(),
            ring: vec![
                Point3::new(1.23456, 2.0, -3.98765),
                Point3::new(0.005, 1.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.23456, 2.0, -3.98765),
            ],
            is_line: true,
        };
        let trace = wire_trace(&wire);
        assert_eq!(trace[0], [1.23, 2.0, -3.99]);
        assert_eq!(trace[1], [0.01, 1.0, 0.0]);
        assert_eq!(trace.len(), 4);
    }

    #[test]
    fn zero_wires_is_invalid() {
        let settings = WireSettings {
            h_count: 0,
            v_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            generate_lattice(&cube_mesh(1.0), &Transform::identity(), &settings),
            Err(WireError::InvalidSettings(_))
        ));
    }
}
