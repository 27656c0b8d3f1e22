//! §4.4 branch 1 — hydrate-from-empty: the buffer has no content yet.

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey};
use crate::planner::render::render_subtree;
use crate::planner::{offset_entries, DecoratorScope, DiffPlan, Instruction, PruneScope};

/// Builds the whole document from scratch. Returns `None` when the pending
/// root has no children, avoiding a zero-length insert/rebuild cycle on an
/// editor that starts (and stays) empty.
pub fn plan(pending_state: &EditorState) -> Option<DiffPlan> {
    if pending_state.children_of(NodeKey::ROOT).is_empty() {
        return None;
    }

    let rendered = render_subtree(pending_state, NodeKey::ROOT);
    let entries = offset_entries(&rendered.entries, 0);
    let chars_added = rendered.attributed.len();

    let mut plan = DiffPlan::labeled(PathLabel::HydrateFromEmpty);
    plan.instructions.push(Instruction::Insert(0, rendered.attributed));
    plan.spliced_subtree = entries;
    plan.prune_scope = PruneScope::Global;
    plan.resort_document_order = true;
    plan.decorator_scope = DecoratorScope::Subtree(NodeKey::ROOT);
    let _ = chars_added; // recorded by the applier via the Insert instruction's length
    Some(plan)
}
