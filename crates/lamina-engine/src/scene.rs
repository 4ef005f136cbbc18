//! Host-facing seams: scene sink, mesh source, and UI control
//! descriptors.
//!
//! The engine never talks to a renderer or a filesystem directly. The
//! host hands in a [`SceneSink`] to receive object lifecycle events and
//! a [`MeshSource`] to resolve asset paths; the engine publishes
//! [`Control`] descriptors the frontend can render as widgets.

use serde::Serialize;

use lamina_math::Point3;

use crate::SceneObject;

/// Receiver for scene lifecycle events.
///
/// `add_object` is an upsert: re-adding an existing id replaces it,
/// which is how transform edits reach the display.
pub trait SceneSink {
    /// Add or replace an object.
    fn add_object(&mut self, id: &str, object: &SceneObject);
    /// Add or replace a polyline group: one closed point ring per line.
    /// Wire lattices that were not converted to tubes arrive here.
    fn add_lines(&mut self, id: &str, rings: &[Vec<Point3>]);
    /// Remove an object by id. Unknown ids are ignored.
    fn remove_object(&mut self, id: &str);
    /// Remove everything.
    fn clear(&mut self);
    /// Camera hint: frame a region of the given center and size.
    fn frame(&mut self, center: Point3, size: f64);
}

/// One recorded scene event.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// Object added or replaced.
    Added(String),
    /// Polyline group added or replaced, with its ring count.
    AddedLines(String, usize),
    /// Object removed.
    Removed(String),
    /// Scene cleared.
    Cleared,
    /// Camera framed.
    Framed,
}

/// A sink that records events for inspection. Backs the engine tests
/// and doubles as a dry-run sink for hosts without a display.
#[derive(Debug, Default)]
pub struct RecordingScene {
    events: Vec<SceneEvent>,
    live: Vec<String>,
    lines: std::collections::HashMap<String, Vec<Vec<Point3>>>,
}

impl RecordingScene {
    /// Empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in arrival order.
    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    /// Ids currently present (adds minus removes/clears).
    pub fn live_ids(&self) -> &[String] {
        &self.live
    }

    /// Rings of a live polyline group, if any.
    pub fn line_rings(&self, id: &str) -> Option<&[Vec<Point3>]> {
        self.lines.get(id).map(Vec::as_slice)
    }
}

impl SceneSink for RecordingScene {
    fn add_object(&mut self, id: &str, _object: &SceneObject) {
        if !self.live.iter().any(|l| l == id) {
            self.live.push(id.to_string());
        }
        self.events.push(SceneEvent::Added(id.to_string()));
    }

    fn add_lines(&mut self, id: &str, rings: &[Vec<Point3>]) {
        if !self.live.iter().any(|l| l == id) {
            self.live.push(id.to_string());
        }
        self.lines.insert(id.to_string(), rings.to_vec());
        self.events
            .push(SceneEvent::AddedLines(id.to_string(), rings.len()));
    }

    fn remove_object(&mut self, id: &str) {
        self.live.retain(|l| l != id);
        self.lines.remove(id);
        self.events.push(SceneEvent::Removed(id.to_string()));
    }

    fn clear(&mut self) {
        self.live.clear();
        self.lines.clear();
        self.events.push(SceneEvent::Cleared);
    }

    fn frame(&mut self, _center: Point3, _size: f64) {
        self.events.push(SceneEvent::Framed);
    }
}

/// Resolver for mesh asset paths.
pub trait MeshSource {
    /// Fetch the raw bytes behind `path`.
    fn load(&self, path: &str) -> std::io::Result<Vec<u8>>;
}

/// In-memory mesh source keyed by path. Useful for tests and hosts
/// that preload their assets.
#[derive(Debug, Default)]
pub struct MemorySource {
    assets: std::collections::HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes under a path.
    pub fn insert(&mut self, path: &str, data: Vec<u8>) {
        self.assets.insert(path.to_string(), data);
    }
}

impl MeshSource for MemorySource {
    fn load(&self, path: &str) -> std::io::Result<Vec<u8>> {
        self.assets.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no asset registered at '{path}'"),
            )
        })
    }
}

/// UI widget descriptor published by the engine after generating
/// artifacts, for the frontend to render as live controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Control {
    /// Bounded slider.
    Slider {
        /// Stable control id.
        id: String,
        /// Display label.
        label: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// Increment.
        step: f64,
        /// Current value.
        value: f64,
    },
    /// Free numeric field.
    Number {
        /// Stable control id.
        id: String,
        /// Display label.
        label: String,
        /// Current value.
        value: f64,
    },
    /// On/off toggle.
    Checkbox {
        /// Stable control id.
        id: String,
        /// Display label.
        label: String,
        /// Current state.
        checked: bool,
    },
}

impl Control {
    /// The control's stable id.
    pub fn id(&self) -> &str {
        match self {
            Control::Slider { id, .. } | Control::Number { id, .. } | Control::Checkbox { id, .. } => id,
        }
    }
}
