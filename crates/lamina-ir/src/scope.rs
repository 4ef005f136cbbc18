//! Scope-stack builder used while compiling a block graph bottom-up.
//!
//! Each open scope frame accumulates the commands of one nested statement
//! body. Closing a frame hands its list back to the caller, which attaches
//! it as the `children` of the command being emitted. A captured child
//! list is owned by exactly one parent — the builder never re-pushes it
//! onto the enclosing frame, so the interpreter walks each child once.

use crate::Command;

/// Accumulates commands into strictly nested scope frames.
///
/// The bottom frame is the top-level command list of the program being
/// compiled; it is always present.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Vec<Command>>,
}

impl ScopeStack {
    /// Create a builder with an empty top-level frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Vec::new()],
        }
    }

    /// Append a command to the innermost open frame.
    pub fn push(&mut self, command: Command) {
        // The top-level frame always exists; a missing one means reset()
        // raced a compile, which is a compiler bug.
        debug_assert!(!self.frames.is_empty(), "scope stack has no frames");
        if let Some(frame) = self.frames.last_mut() {
            frame.push(command);
        }
    }

    /// Open a new nested scope.
    pub fn new_scope(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Close the innermost scope, returning its accumulated commands.
    ///
    /// Closing more scopes than were opened is an internal invariant
    /// violation in the block compiler; it is guarded (empty list back,
    /// top-level frame kept) rather than surfaced to the user.
    pub fn pop_scope(&mut self) -> Vec<Command> {
        debug_assert!(self.frames.len() > 1, "pop_scope with no open scope");
        if self.frames.len() > 1 {
            self.frames.pop().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Number of open nested scopes (0 when only the top level is open).
    pub fn depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    /// Discard all frames and start over with an empty top level.
    ///
    /// Called once per render cycle before the visual program is
    /// recompiled into a fresh tree.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frames.push(Vec::new());
    }

    /// Finish the compile: return the top-level command list.
    ///
    /// Unclosed scopes are abandoned and their commands dropped.
    pub fn finish(mut self) -> Vec<Command> {
        debug_assert!(self.frames.len() == 1, "finish with open scopes");
        self.frames.drain(1..);
        self.frames.pop().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Op, Value};

    fn set(name: &str, n: f64) -> Command {
        Command::new(Op::SetVariable {
            name: name.into(),
            value: Value::Number(n),
        })
    }

    #[test]
    fn nested_scopes_capture_children() {
        let mut scopes = ScopeStack::new();
        scopes.push(set("a", 1.0));

        // Compile a loop body in its own frame.
        scopes.new_scope();
        scopes.push(set("b", 2.0));
        scopes.push(set("c", 3.0));
        let body = scopes.pop_scope();
        assert_eq!(body.len(), 2);

        scopes.push(Command::with_children(
            Op::ForLoop {
                var: "i".into(),
                from: Value::Number(0.0),
                to: Value::Number(3.0),
                step: Value::Number(1.0),
            },
            body,
        ));

        let top = scopes.finish();
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].children.len(), 2);
        // The captured children live only under the loop, not at top level.
        assert_eq!(top[0].op.kind(), "set_variable");
        assert_eq!(top[1].op.kind(), "for_loop");
    }

    #[test]
    fn deeply_nested() {
        let mut scopes = ScopeStack::new();
        scopes.new_scope();
        scopes.new_scope();
        scopes.push(set("x", 9.0));
        let inner = scopes.pop_scope();
        scopes.push(Command::with_children(
            Op::IfStatement {
                condition: "x > 0".into(),
            },
            inner,
        ));
        let outer = scopes.pop_scope();
        assert_eq!(scopes.depth(), 0);
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].children.len(), 1);
    }

    #[test]
    fn reset_discards_everything() {
        let mut scopes = ScopeStack::new();
        scopes.push(set("a", 1.0));
        scopes.new_scope();
        scopes.push(set("b", 2.0));
        scopes.reset();
        assert_eq!(scopes.depth(), 0);
        assert!(scopes.finish().is_empty());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn unbalanced_pop_is_guarded() {
        let mut scopes = ScopeStack::new();
        assert!(scopes.pop_scope().is_empty());
        scopes.push(set("a", 1.0));
        assert_eq!(scopes.finish().len(), 1);
    }
}
