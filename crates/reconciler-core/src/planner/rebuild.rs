//! §4.4 branch 10 — rebuild: the slow path. No fast-path classifier
//! matched (or `use_optimized_reconciler` is off), so the whole document
//! is re-rendered from `pending_state` and swapped in as one delete plus
//! one insert. Infallible: every other classifier returns `Option`, this
//! one always produces a plan, so `classify` can fall through to it
//! unconditionally.

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey};
use crate::planner::render::render_subtree;
use crate::planner::{offset_entries, DecoratorScope, DiffPlan, Instruction, PruneScope};
use crate::range_cache::RangeCache;

pub fn plan(_prev_state: &EditorState, pending_state: &EditorState, range_cache: &RangeCache) -> DiffPlan {
    let root_entire_len: u32 = range_cache
        .get(NodeKey::ROOT)
        .map(|entry| entry.entire_len())
        .unwrap_or(0);

    let rendered = render_subtree(pending_state, NodeKey::ROOT);
    let entries = offset_entries(&rendered.entries, 0);

    let mut plan = DiffPlan::labeled(PathLabel::Rebuild);
    if root_entire_len > 0 {
        plan.instructions
            .push(Instruction::Delete(0..root_entire_len as usize));
    }
    if !rendered.attributed.text.is_empty() {
        plan.instructions
            .push(Instruction::Insert(0, rendered.attributed));
    }
    plan.spliced_subtree = entries;
    plan.prune_scope = PruneScope::Global;
    plan.resort_document_order = true;
    plan.decorator_scope = DecoratorScope::Subtree(NodeKey::ROOT);
    plan
}
