//! §7 error taxonomy. All variants are non-panicking at API boundaries:
//! they are reported up through `reconcile()`'s `Result`, never thrown past
//! it as a panic.

use thiserror::Error;

use crate::node_tree::NodeKey;

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    /// Internal consistency break (§8.1). The update is aborted and the
    /// previous buffer is preserved.
    #[error("invariant {invariant} violated at node {key:?}: {detail}")]
    InvariantViolation {
        key: NodeKey,
        invariant: &'static str,
        detail: String,
    },

    /// `pending_state` references a key absent from both `prev_state` and
    /// `pending_state`'s own node map.
    #[error("stale state: key {key:?} is not present in prev or pending state")]
    StaleState { key: NodeKey },

    /// A selection point could not be mapped to an absolute location.
    /// Selection reconcile is skipped; text changes still commit.
    #[error("could not map selection point for key {key:?} at offset {offset}")]
    PointMappingFailure { key: NodeKey, offset: usize },

    /// A mutation was attempted inside a read-only scope.
    #[error("mutation attempted inside a read-only scope")]
    ReadOnly,

    /// A marked-text (IME) operation was inconsistent with the current
    /// composition state. Composition is canceled and the update retried
    /// as a normal classifier.
    #[error("composition protocol error: {0}")]
    CompositionProtocolError(String),

    /// The backing buffer rejected an edit or attribute operation.
    #[error(transparent)]
    Buffer(#[from] reconciler_buffer::BufferError),
}
