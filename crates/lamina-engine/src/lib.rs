#![warn(missing_docs)]

//! Command-tree interpreter.
//!
//! Walks a compiled [`Program`] and turns its commands into scene
//! objects, wire lattices, and stacked-layer sets. The interpreter owns
//! the object table and the shared variable context; rendering and
//! asset loading stay behind the [`SceneSink`] and [`MeshSource`] trait
//! seams so the engine runs identically under a GUI host, the CLI, or
//! the tests.
//!
//! Execution model: a command's children run first, in source order,
//! exactly once; the last non-null child result becomes the command's
//! local object id, then the command applies its own effect. A failing
//! command is logged and isolated — its siblings still run.

use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use lamina_ir::{Command, Op, Program, Value};
use lamina_layers::{LayerOutline, LayerSettings, LayerStack};
use lamina_math::{Point3, Transform};
use lamina_mesh::{cube_mesh, parse_stl, MeshError, TriangleMesh};
use lamina_wire::{generate_lattice, Wire, WireError, WireSession, WireSettings};

pub mod expr;
pub mod scene;

pub use expr::{eval_str, ExprError};
pub use scene::{Control, MemorySource, MeshSource, RecordingScene, SceneEvent, SceneSink};

/// Errors raised by command handlers.
///
/// These never escape [`Interpreter::process`]: each command is a
/// fallible unit, logged and isolated so its siblings still run.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An object-consuming command ran with no current object.
    #[error("no current object")]
    NoCurrentObject,

    /// An object id that is not in the table.
    #[error("unknown object '{0}'")]
    UnknownObject(String),

    /// A wire command ran outside an initialized session.
    #[error("no wire-mesh session is open")]
    NoWireSession,

    /// Asset resolution failed.
    #[error("asset error: {0}")]
    Asset(#[from] std::io::Error),

    /// Mesh decoding failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Stacked-layer generation failed.
    #[error(transparent)]
    Layers(#[from] lamina_layers::LayerError),

    /// Wire-lattice generation failed.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// What a scene object is, for hosts that render kinds differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Imported or uploaded mesh.
    Mesh,
    /// Primitive cube.
    Cube,
    /// Collected wire lattice.
    WireGroup,
    /// One extruded stacked-layer slab.
    LayerSlab,
}

/// One entry of the object table: geometry plus its live transform.
#[derive(Debug, Clone)]
pub struct SceneObject {
    /// Triangle geometry in local coordinates.
    pub mesh: TriangleMesh,
    /// Local-to-world transform, mutated by the transform commands.
    pub transform: Transform,
    /// Object kind.
    pub kind: ObjectKind,
}

/// The interpreter's object store: id → object, plus the "current
/// object" pointer that object-consuming commands default to.
///
/// Entries are freed only by `ClearScene`; there is no per-object
/// delete in the command set.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: HashMap<String, SceneObject>,
    current: Option<String>,
    next_id: u64,
}

impl ObjectTable {
    /// Insert under a generated id (`{base}-{n}`), returning the id.
    /// Does not touch the current pointer.
    pub fn insert(&mut self, base: &str, object: SceneObject) -> String {
        self.next_id += 1;
        let id = format!("{base}-{}", self.next_id);
        self.objects.insert(id.clone(), object);
        id
    }

    /// Look up by id.
    pub fn get(&self, id: &str) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut SceneObject> {
        self.objects.get_mut(id)
    }

    /// Id of the current object.
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Point "current" at an existing id.
    pub fn set_current(&mut self, id: &str) {
        self.current = Some(id.to_string());
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every object and null the current pointer.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.current = None;
    }
}

/// Shared variable context: one flat global table.
///
/// Loop and conditional bodies read and write the same table as
/// top-level code — dynamic scoping, matching how the block editor's
/// variables behave.
#[derive(Debug, Default)]
pub struct VarContext {
    vars: HashMap<String, f64>,
}

impl VarContext {
    /// Write a variable.
    pub fn set(&mut self, name: &str, value: f64) {
        self.vars.insert(name.to_string(), value);
    }

    /// Read a variable.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }

    /// The underlying table, for the expression evaluator.
    pub fn map(&self) -> &HashMap<String, f64> {
        &self.vars
    }
}

/// A collected wire lattice, kept for the tabular export sink.
#[derive(Debug)]
pub struct WireGroup {
    /// Scene object id of the group.
    pub id: String,
    /// The wires, in generation order.
    pub wires: Vec<Wire>,
}

fn layer_scene_id(source: &str, index: usize) -> String {
    format!("{source}-layer-{index}")
}

/// The command-tree interpreter.
pub struct Interpreter<S: SceneSink, M: MeshSource> {
    objects: ObjectTable,
    vars: VarContext,
    scene: S,
    source: M,
    wire_session: Option<WireSession>,
    wire_groups: Vec<WireGroup>,
    layers: LayerStack,
    layer_exports: Vec<LayerOutline>,
    controls: Vec<Control>,
    trace: Vec<&'static str>,
}

impl<S: SceneSink, M: MeshSource> Interpreter<S, M> {
    /// New interpreter over the given scene sink and mesh source.
    pub fn new(scene: S, source: M) -> Self {
        Self {
            objects: ObjectTable::default(),
            vars: VarContext::default(),
            scene,
            source,
            wire_session: None,
            wire_groups: Vec::new(),
            layers: LayerStack::new(),
            layer_exports: Vec::new(),
            controls: Vec::new(),
            trace: Vec::new(),
        }
    }

    /// Run every top-level command of a program in source order.
    pub fn run(&mut self, program: &Program) {
        info!(commands = program.commands.len(), version = %program.version, "running program");
        for command in &program.commands {
            self.process(command);
        }
    }

    /// Execute one command tree; returns the produced object id, if any.
    ///
    /// Errors are logged and swallowed here so sibling commands always
    /// run.
    pub fn process(&mut self, command: &Command) -> Option<String> {
        match self.dispatch(command) {
            Ok(id) => id,
            Err(err) => {
                warn!(kind = command.op.kind(), error = %err, "command failed; continuing");
                None
            }
        }
    }

    /// Drain a due debounced reslice. Returns true when a reslice ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.layers.regenerate_due(now) {
            return false;
        }
        let Some(src) = self.layers.source_id().map(String::from) else {
            return false;
        };
        let Some(object) = self.objects.get(&src) else {
            warn!(source = %src, "layer source object vanished; dropping layer set");
            self.drop_layer_scene_objects();
            return false;
        };
        let mesh = object.mesh.clone();
        let transform = object.transform.clone();

        let old: Vec<usize> = self.layers.layers().iter().map(|l| l.index).collect();
        match self.layers.regenerate(&mesh, &transform) {
            Ok(_) => {
                for index in old {
                    self.scene.remove_object(&layer_scene_id(&src, index));
                }
                self.add_layer_scene_objects(&src);
                true
            }
            Err(err) => {
                warn!(error = %err, "debounced reslice failed; keeping previous layers");
                false
            }
        }
    }

    /// The scene sink, for hosts that need to inspect it afterwards.
    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// The object table.
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// The shared variable context.
    pub fn vars(&self) -> &VarContext {
        &self.vars
    }

    /// Executed op kinds in order, for diagnostics.
    pub fn trace(&self) -> &[&'static str] {
        &self.trace
    }

    /// Collected wire groups, in creation order.
    pub fn wire_groups(&self) -> &[WireGroup] {
        &self.wire_groups
    }

    /// The active stacked layers, empty when idle.
    pub fn layers(&self) -> &[lamina_layers::Layer] {
        self.layers.layers()
    }

    /// Flat outlines captured by the last `ExportLayers`.
    pub fn layer_exports(&self) -> &[LayerOutline] {
        &self.layer_exports
    }

    /// Control descriptors published for the frontend.
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    fn dispatch(&mut self, command: &Command) -> Result<Option<String>> {
        match &command.op {
            // Control flow owns its children: they are the body, not
            // inputs, so the op traces before them.
            Op::IfStatement { condition } => {
                self.trace.push(command.op.kind());
                self.exec_if(condition, &command.children);
                Ok(None)
            }
            Op::ForLoop {
                var,
                from,
                to,
                step,
            } => {
                self.trace.push(command.op.kind());
                self.exec_for(var, from, to, step, &command.children);
                Ok(None)
            }
            _ => {
                let child_result = self.run_children(command);
                self.trace.push(command.op.kind());
                self.apply(&command.op, child_result)
            }
        }
    }

    /// Run input children once, in source order, threading the last
    /// non-null result.
    fn run_children(&mut self, command: &Command) -> Option<String> {
        let mut last = None;
        for child in &command.children {
            if let Some(id) = self.process(child) {
                last = Some(id);
            }
        }
        last
    }

    fn apply(&mut self, op: &Op, child_result: Option<String>) -> Result<Option<String>> {
        match op {
            Op::LoadMesh { path } => {
                let bytes = self.source.load(path)?;
                let mesh = parse_stl(&bytes)?;
                let stem = path.rsplit('/').next().unwrap_or(path);
                let stem = stem.strip_suffix(".stl").unwrap_or(stem);
                Ok(Some(self.add_object(stem, mesh, ObjectKind::Mesh)))
            }
            Op::UploadMesh { name, data } => {
                let mesh = parse_stl(data)?;
                Ok(Some(self.add_object(name, mesh, ObjectKind::Mesh)))
            }
            Op::CreateCube { size } => {
                Ok(Some(self.add_object("cube", cube_mesh(*size), ObjectKind::Cube)))
            }
            Op::Translate { x, y, z } => {
                let delta = Transform::translation(
                    self.resolve_number(x),
                    self.resolve_number(y),
                    self.resolve_number(z),
                );
                self.apply_transform(child_result, &delta)
            }
            Op::Rotate { x, y, z } => {
                let delta = Transform::rotation_euler_deg(
                    self.resolve_number(x),
                    self.resolve_number(y),
                    self.resolve_number(z),
                );
                self.apply_transform(child_result, &delta)
            }
            Op::Scale { x, y, z } => {
                let delta = Transform::scale(
                    self.resolve_number(x),
                    self.resolve_number(y),
                    self.resolve_number(z),
                );
                self.apply_transform(child_result, &delta)
            }
            Op::GenerateWireMesh {
                h_count,
                v_count,
                thickness,
                use_tubes,
            } => {
                let id = self.target_id(child_result)?;
                let object = self
                    .objects
                    .get(&id)
                    .ok_or_else(|| EngineError::UnknownObject(id.clone()))?;
                let settings = WireSettings {
                    h_count: *h_count,
                    v_count: *v_count,
                    thickness: *thickness,
                    use_tubes: *use_tubes,
                    ..Default::default()
                };
                let wires = generate_lattice(&object.mesh, &object.transform, &settings)?;
                self.register_wire_group(wires).map(Some)
            }
            Op::InitializeWireMesh => {
                if self.wire_session.is_some() {
                    debug!("replacing an already-open wire session");
                }
                self.wire_session = Some(WireSession::new());
                Ok(None)
            }
            Op::AddHorizontalWire {
                position,
                thickness,
                color,
            } => self.add_session_wire(child_result, position, *thickness, color, true),
            Op::AddVerticalWire {
                position,
                thickness,
                color,
            } => self.add_session_wire(child_result, position, *thickness, color, false),
            Op::ConvertToTubes { thickness } => {
                self.wire_session
                    .as_mut()
                    .ok_or(EngineError::NoWireSession)?
                    .convert_to_tubes(*thickness);
                Ok(None)
            }
            Op::CollectWireMesh => {
                let session = self.wire_session.take().ok_or(EngineError::NoWireSession)?;
                self.register_wire_group(session.collect()).map(Some)
            }
            Op::GenerateStackedLayers { material_thickness } => {
                let id = self.target_id(child_result)?;
                self.drop_layer_scene_objects();
                let object = self
                    .objects
                    .get(&id)
                    .ok_or_else(|| EngineError::UnknownObject(id.clone()))?;
                let settings = LayerSettings {
                    material_thickness: *material_thickness,
                    ..Default::default()
                };
                let count =
                    self.layers
                        .generate(&id, &object.mesh, &object.transform, settings)?;
                self.add_layer_scene_objects(&id);
                self.publish_layer_controls(*material_thickness);
                info!(count, source = %id, "stacked layers generated");
                Ok(None)
            }
            Op::ExportLayers => {
                self.layer_exports = self.layers.export_outlines()?;
                info!(count = self.layer_exports.len(), "layer outlines exported");
                Ok(None)
            }
            Op::ClearStackedLayers => {
                self.drop_layer_scene_objects();
                self.layer_exports.clear();
                self.controls.clear();
                Ok(None)
            }
            Op::DisplayObject => {
                let id = self.target_id(child_result)?;
                let object = self
                    .objects
                    .get(&id)
                    .ok_or_else(|| EngineError::UnknownObject(id.clone()))?;
                // Line-only wire groups carry no triangles; frame them
                // from their ring points instead.
                let (min, max) = object
                    .mesh
                    .bounds_transformed(&object.transform)
                    .or_else(|| self.wire_group_bounds(&id))
                    .ok_or(MeshError::EmptyMesh)?;
                let center = Point3::new(
                    (min.x + max.x) / 2.0,
                    (min.y + max.y) / 2.0,
                    (min.z + max.z) / 2.0,
                );
                self.scene.frame(center, (max - min).norm());
                Ok(Some(id))
            }
            Op::ClearScene => {
                self.objects.clear();
                self.scene.clear();
                self.layers.clear();
                self.wire_session = None;
                self.wire_groups.clear();
                self.layer_exports.clear();
                self.controls.clear();
                Ok(None)
            }
            Op::SetVariable { name, value } => {
                let resolved = self.resolve_number(value);
                self.vars.set(name, resolved);
                Ok(None)
            }
            // Handled in dispatch.
            Op::IfStatement { .. } | Op::ForLoop { .. } => Ok(None),
        }
    }

    fn exec_if(&mut self, condition: &str, body: &[Command]) {
        if self.eval_condition(condition) {
            for child in body {
                self.process(child);
            }
        }
    }

    fn exec_for(&mut self, var: &str, from: &Value, to: &Value, step: &Value, body: &[Command]) {
        let from = self.resolve_number(from);
        let to = self.resolve_number(to);
        let step = self.resolve_number(step);
        if !(from.is_finite() && to.is_finite() && step.is_finite()) || step <= 0.0 {
            warn!(from, to, step, "degenerate loop bounds; skipping");
            return;
        }
        let mut i = from;
        while i < to {
            self.vars.set(var, i);
            for child in body {
                self.process(child);
            }
            i += step;
        }
    }

    /// Resolve a parameter: literal number, bool (1/0), or expression
    /// over the variable context. Failures log and fall back to 0.
    fn resolve_number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Str(src) => match expr::eval_str(src, self.vars.map()) {
                Ok(n) => n,
                Err(err) => {
                    warn!(expr = %src, error = %err, "expression failed; using 0");
                    0.0
                }
            },
        }
    }

    /// Evaluate a condition; failures log and fall back to false.
    fn eval_condition(&self, src: &str) -> bool {
        match expr::eval_str(src, self.vars.map()) {
            Ok(n) => n != 0.0,
            Err(err) => {
                warn!(expr = %src, error = %err, "condition failed; treating as false");
                false
            }
        }
    }

    fn target_id(&self, child_result: Option<String>) -> Result<String> {
        child_result
            .or_else(|| self.objects.current_id().map(String::from))
            .ok_or(EngineError::NoCurrentObject)
    }

    fn add_object(&mut self, base: &str, mesh: TriangleMesh, kind: ObjectKind) -> String {
        let object = SceneObject {
            mesh,
            transform: Transform::identity(),
            kind,
        };
        let id = self.objects.insert(base, object);
        self.objects.set_current(&id);
        if let Some(object) = self.objects.get(&id) {
            self.scene.add_object(&id, object);
        }
        debug!(id = %id, ?kind, "object created");
        id
    }

    fn apply_transform(
        &mut self,
        child_result: Option<String>,
        delta: &Transform,
    ) -> Result<Option<String>> {
        let id = self.target_id(child_result)?;
        let object = self
            .objects
            .get_mut(&id)
            .ok_or_else(|| EngineError::UnknownObject(id.clone()))?;
        object.transform = object.transform.then(delta);
        self.scene.add_object(&id, object);

        let is_layer_source = self.layers.source_id() == Some(id.as_str());
        if is_layer_source {
            self.layers.note_transform_edit(Instant::now());
        }
        Ok(Some(id))
    }

    fn add_session_wire(
        &mut self,
        child_result: Option<String>,
        position: &Value,
        thickness: f64,
        color: &str,
        horizontal: bool,
    ) -> Result<Option<String>> {
        let position = self.resolve_number(position);
        let id = self.target_id(child_result)?;
        let object = self
            .objects
            .get(&id)
            .ok_or_else(|| EngineError::UnknownObject(id.clone()))?;
        let session = self.wire_session.as_mut().ok_or(EngineError::NoWireSession)?;
        let added = if horizontal {
            session.add_horizontal_wire(&object.mesh, &object.transform, position, thickness, color)
        } else {
            session.add_vertical_wire(&object.mesh, &object.transform, position, thickness, color)
        };
        if !added {
            debug!(position, "wire cut was degenerate; nothing added");
        }
        Ok(None)
    }

    /// Register a finished wire group: tube solids merge into one scene
    /// object, polyline wires go to the sink's line channel, and the
    /// wires themselves are kept for the tabular export.
    fn register_wire_group(&mut self, wires: Vec<Wire>) -> Result<String> {
        let mut merged = TriangleMesh::new();
        let mut rings: Vec<Vec<Point3>> = Vec::new();
        for wire in &wires {
            if wire.is_line {
                rings.push(wire.ring.clone());
            } else {
                merged.merge(&wire.build_tube()?);
            }
        }
        let has_solids = merged.num_triangles() > 0;
        let object = SceneObject {
            mesh: merged,
            transform: Transform::identity(),
            kind: ObjectKind::WireGroup,
        };
        let id = self.objects.insert("wires", object);
        self.objects.set_current(&id);
        if has_solids {
            if let Some(object) = self.objects.get(&id) {
                self.scene.add_object(&id, object);
            }
        }
        if !rings.is_empty() {
            self.scene.add_lines(&id, &rings);
        }
        info!(id = %id, count = wires.len(), "wire group collected");
        self.wire_groups.push(WireGroup {
            id: id.clone(),
            wires,
        });
        Ok(id)
    }

    fn wire_group_bounds(&self, id: &str) -> Option<(Point3, Point3)> {
        let group = self.wire_groups.iter().find(|g| g.id == id)?;
        let mut points = group.wires.iter().flat_map(|w| w.ring.iter());
        let first = *points.next()?;
        let (mut min, mut max) = (first, first);
        for p in points {
            min = Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        Some((min, max))
    }

    fn add_layer_scene_objects(&mut self, source: &str) {
        for layer in self.layers.layers() {
            let object = SceneObject {
                mesh: layer.solid.clone(),
                transform: Transform::identity(),
                kind: ObjectKind::LayerSlab,
            };
            self.scene
                .add_object(&layer_scene_id(source, layer.index), &object);
        }
    }

    fn drop_layer_scene_objects(&mut self) {
        if let Some(source) = self.layers.source_id().map(String::from) {
            for layer in self.layers.clear() {
                self.scene.remove_object(&layer_scene_id(&source, layer.index));
            }
        }
    }

    fn publish_layer_controls(&mut self, material_thickness: f64) {
        self.controls = vec![
            Control::Slider {
                id: "material_thickness".into(),
                label: "Material thickness (mm)".into(),
                min: 1.0,
                max: 20.0,
                step: 0.5,
                value: material_thickness,
            },
            Control::Checkbox {
                id: "show_original".into(),
                label: "Show original model".into(),
                checked: true,
            },
            Control::Number {
                id: "translate_x".into(),
                label: "Position X".into(),
                value: 0.0,
            },
            Control::Number {
                id: "translate_y".into(),
                label: "Position Y".into(),
                value: 0.0,
            },
            Control::Number {
                id: "translate_z".into(),
                label: "Position Z".into(),
                value: 0.0,
            },
        ];
    }
}
