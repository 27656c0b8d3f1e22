//! Incremental reconciler: transforms a logical node tree into an attributed
//! text buffer, maintaining a range cache, a Fenwick-indexed location map,
//! and decorator/selection/composition state across updates.

pub mod composition;
pub mod config;
pub mod decorators;
pub mod document_order;
pub mod error;
pub mod fenwick;
pub mod keyed_diff;
pub mod metrics;
pub mod node_tree;
pub mod planner;
pub mod range_cache;
pub mod reconciler;
pub mod selection;

mod applier;

pub use config::ReconcilerConfig;
pub use error::ReconcileError;
pub use metrics::ReconcileMetrics;
pub use node_tree::{EditorState, NodeKey, NodeKind, NodeRecord, NodeTree, TextFormat};
pub use planner::Instruction;
pub use reconciler::{reconcile, PendingUpdate};
