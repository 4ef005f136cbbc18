#![warn(missing_docs)]

//! Command-tree intermediate representation for lamina block programs.
//!
//! The visual block editor compiles a user-built block graph into this
//! tree, which the engine interpreter then walks. The IR is purely
//! declarative — no geometry, just operations and their nesting.
//!
//! Commands are built bottom-up through a [`ScopeStack`]: a block with
//! nested statement inputs opens a scope, compiles its children into it,
//! pops the scope, and emits itself with the captured children attached.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod scope;

pub use scope::ScopeStack;

/// A scalar parameter value.
///
/// Strings appear where the block editor allows a literal, a variable
/// name, or a small arithmetic expression (resolved by the interpreter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value (f64, conventionally millimeters).
    Number(f64),
    /// String: literal text, a variable name, or an expression.
    Str(String),
}

impl Value {
    /// The numeric payload, if this value is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

/// One visual-program operation — the closed set of command kinds.
///
/// Every variant is matched exhaustively by the interpreter; a kind the
/// engine does not know is a deserialization error, never a runtime
/// fall-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Op {
    /// Load a triangulated mesh asset from a path.
    LoadMesh {
        /// Asset path understood by the host's mesh source.
        path: String,
    },
    /// Decode an uploaded in-memory mesh (binary STL bytes).
    UploadMesh {
        /// Display name for the uploaded model.
        name: String,
        /// Raw file content.
        data: Vec<u8>,
    },
    /// Create an axis-aligned cube with one corner at the origin.
    CreateCube {
        /// Edge length.
        size: f64,
    },
    /// Translate the current object.
    Translate {
        /// Offset along X.
        x: Value,
        /// Offset along Y.
        y: Value,
        /// Offset along Z.
        z: Value,
    },
    /// Rotate the current object by Euler angles in degrees (X, then Y, then Z).
    Rotate {
        /// Rotation about X in degrees.
        x: Value,
        /// Rotation about Y in degrees.
        y: Value,
        /// Rotation about Z in degrees.
        z: Value,
    },
    /// Scale the current object per axis.
    Scale {
        /// Scale factor along X.
        x: Value,
        /// Scale factor along Y.
        y: Value,
        /// Scale factor along Z.
        z: Value,
    },
    /// Slice the current object into a full wire lattice in one shot.
    GenerateWireMesh {
        /// Number of horizontal wires (cut across the Y extent).
        h_count: u32,
        /// Number of vertical wires (cut across the Z extent).
        v_count: u32,
        /// Wire thickness (tube diameter) in mm.
        thickness: f64,
        /// Build tube solids instead of polylines.
        use_tubes: bool,
    },
    /// Open an incremental wire-mesh session.
    InitializeWireMesh,
    /// Add one horizontal wire to the open session.
    AddHorizontalWire {
        /// Cut height: literal, variable name, or expression.
        position: Value,
        /// Wire thickness in mm.
        thickness: f64,
        /// Display color (e.g. "#ff8800").
        color: String,
    },
    /// Add one vertical wire to the open session.
    AddVerticalWire {
        /// Cut position along Z: literal, variable name, or expression.
        position: Value,
        /// Wire thickness in mm.
        thickness: f64,
        /// Display color.
        color: String,
    },
    /// Retroactively turn every accumulated wire into a tube solid.
    ConvertToTubes {
        /// Tube diameter in mm.
        thickness: f64,
    },
    /// Group the session's wires into one artifact and close the session.
    CollectWireMesh,
    /// Slice the current object into stacked laser-cut layers.
    GenerateStackedLayers {
        /// Sheet material thickness in mm (drives the layer count).
        material_thickness: f64,
    },
    /// Export the stacked layers as flat 2D outlines.
    ExportLayers,
    /// Discard the stacked-layer set and return to idle.
    ClearStackedLayers,
    /// Display the current object and frame the camera on it.
    DisplayObject,
    /// Remove every object from the table and the scene.
    ClearScene,
    /// Write a variable into the shared context.
    SetVariable {
        /// Variable name.
        name: String,
        /// Value: literal, variable name, or expression.
        value: Value,
    },
    /// Run children when the condition evaluates true (no else branch).
    IfStatement {
        /// Boolean-valued expression over the shared context.
        condition: String,
    },
    /// Iterate a numeric variable, running children each iteration.
    ForLoop {
        /// Loop variable name (written into the shared context).
        var: String,
        /// Inclusive start.
        from: Value,
        /// Exclusive end.
        to: Value,
        /// Step (must be positive to make progress).
        step: Value,
    },
}

impl Op {
    /// Stable snake_case name of this operation (the serde tag).
    pub fn kind(&self) -> &'static str {
        match self {
            Op::LoadMesh { .. } => "load_mesh",
            Op::UploadMesh { .. } => "upload_mesh",
            Op::CreateCube { .. } => "create_cube",
            Op::Translate { .. } => "translate",
            Op::Rotate { .. } => "rotate",
            Op::Scale { .. } => "scale",
            Op::GenerateWireMesh { .. } => "generate_wire_mesh",
            Op::InitializeWireMesh => "initialize_wire_mesh",
            Op::AddHorizontalWire { .. } => "add_horizontal_wire",
            Op::AddVerticalWire { .. } => "add_vertical_wire",
            Op::ConvertToTubes { .. } => "convert_to_tubes",
            Op::CollectWireMesh => "collect_wire_mesh",
            Op::GenerateStackedLayers { .. } => "generate_stacked_layers",
            Op::ExportLayers => "export_layers",
            Op::ClearStackedLayers => "clear_stacked_layers",
            Op::DisplayObject => "display_object",
            Op::ClearScene => "clear_scene",
            Op::SetVariable { .. } => "set_variable",
            Op::IfStatement { .. } => "if_statement",
            Op::ForLoop { .. } => "for_loop",
        }
    }
}

/// One node of the command tree: an operation plus its nested children.
///
/// Immutable after creation. `metadata` is reserved for the editor
/// (block ids, source positions) and is not read by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// The operation this node performs.
    #[serde(flatten)]
    pub op: Op,
    /// Nested child commands, executed before this node's own effect.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Command>,
    /// Free-form editor metadata, unused by the engine.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Command {
    /// Create a leaf command.
    pub fn new(op: Op) -> Self {
        Self {
            op,
            children: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Create a command with the given children attached.
    pub fn with_children(op: Op, children: Vec<Command>) -> Self {
        Self {
            op,
            children,
            metadata: HashMap::new(),
        }
    }
}

/// A compiled block program — the engine's only input format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Format version string.
    pub version: String,
    /// Top-level commands in source order.
    pub commands: Vec<Command>,
}

impl Program {
    /// Create an empty program.
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            version: "0.1".to_string(),
            commands,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_program() {
        let program = Program::new(vec![
            Command::new(Op::CreateCube { size: 30.0 }),
            Command::with_children(
                Op::GenerateStackedLayers {
                    material_thickness: 3.0,
                },
                vec![Command::new(Op::LoadMesh {
                    path: "models/bunny.stl".into(),
                })],
            ),
        ]);

        let json = program.to_json().expect("serialize");
        let restored = Program::from_json(&json).expect("deserialize");
        assert_eq!(program, restored);
        assert_eq!(restored.commands.len(), 2);
        assert_eq!(restored.commands[1].children.len(), 1);
    }

    #[test]
    fn serde_kind_tag() {
        let cmd = Command::new(Op::AddHorizontalWire {
            position: Value::Str("h / 2".into()),
            thickness: 1.5,
            color: "#ff8800".into(),
        });
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""kind":"add_horizontal_wire""#));

        let restored: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, restored);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let json = r#"{"kind":"frobnicate","amount":3}"#;
        assert!(serde_json::from_str::<Command>(json).is_err());
    }

    #[test]
    fn value_untagged_forms() {
        let v: Vec<Value> = serde_json::from_str(r#"[1.5, true, "n * 2"]"#).unwrap();
        assert_eq!(v[0], Value::Number(1.5));
        assert_eq!(v[1], Value::Bool(true));
        assert_eq!(v[2], Value::Str("n * 2".into()));
    }
}
