//! C7 (composition half) — IME marked-text start/update/end, kept separate
//! from the normal diff classifiers so a composition in progress never
//! triggers selection reconcile (§8.4 S6).

use std::ops::Range;

use crate::error::ReconcileError;
use crate::node_tree::NodeKey;

/// One marked-text operation reported by an input method, mirroring the
/// shape of a platform `InputHandler`'s composition calls: a replace range
/// in the owning text node's local coordinates, the marked text itself, and
/// the internal (within-marked-text) selection the IME wants shown while
/// composing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedTextOperation {
    /// `true` starts a new composition; `false` updates the existing one.
    pub create: bool,
    pub owner: NodeKey,
    pub replace_range: Range<usize>,
    pub text: String,
    pub internal_selection: Range<usize>,
}

/// Tracks whether a composition is currently open and which node owns it.
/// The reconciler consults this before running the normal classifiers: a
/// non-`None` state routes the update through the composition fast path
/// instead, and suppresses selection reconcile for its duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionState {
    active: Option<NodeKey>,
}

impl CompositionState {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn owner(&self) -> Option<NodeKey> {
        self.active
    }

    /// Validates and applies one marked-text operation to this state
    /// machine. A `create: true` op while already active, or a
    /// `create: false` op naming a different owner than the active one, is
    /// a protocol error (§7 `CompositionProtocolError`): the composition is
    /// canceled and the caller should retry the update as a normal
    /// classifier.
    pub fn apply(&mut self, op: &MarkedTextOperation) -> Result<(), ReconcileError> {
        match (self.active, op.create) {
            (None, true) => {
                self.active = Some(op.owner);
                Ok(())
            }
            (Some(owner), false) if owner == op.owner => Ok(()),
            (Some(_), true) => {
                self.active = None;
                Err(ReconcileError::CompositionProtocolError(
                    "create requested while a composition is already active".to_string(),
                ))
            }
            (Some(owner), false) => {
                self.active = None;
                Err(ReconcileError::CompositionProtocolError(format!(
                    "update targets owner {:?} but active composition owner is {:?}",
                    op.owner, owner
                )))
            }
            (None, false) => {
                Err(ReconcileError::CompositionProtocolError(
                    "update requested with no active composition".to_string(),
                ))
            }
        }
    }

    /// Ends the active composition, committing the marked text as regular
    /// text in the owning node (the caller performs the actual commit; this
    /// only clears the tracked `composition_key`).
    pub fn end(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(create: bool, owner: NodeKey, text: &str) -> MarkedTextOperation {
        MarkedTextOperation {
            create,
            owner,
            replace_range: 0..0,
            text: text.to_string(),
            internal_selection: 0..text.len(),
        }
    }

    #[test]
    fn create_then_update_then_end_clears_state() {
        let mut state = CompositionState::default();
        let owner = NodeKey(1);

        state.apply(&op(true, owner, "か")).unwrap();
        assert!(state.is_active());

        state.apply(&op(false, owner, "か゛")).unwrap();
        assert_eq!(state.owner(), Some(owner));

        state.end();
        assert!(!state.is_active());
    }

    #[test]
    fn update_for_wrong_owner_is_a_protocol_error() {
        let mut state = CompositionState::default();
        state.apply(&op(true, NodeKey(1), "a")).unwrap();
        let err = state.apply(&op(false, NodeKey(2), "b")).unwrap_err();
        assert!(matches!(err, ReconcileError::CompositionProtocolError(_)));
        assert!(!state.is_active());
    }
}
