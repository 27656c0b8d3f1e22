//! §4.4 branch 7 — delete-block: symmetric to insert-block. A single
//! subtree is detached from an existing parent, with no other structural
//! change.

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey, NodeKind};
use crate::planner::{DecoratorScope, DiffPlan, Instruction, PruneScope};
use crate::range_cache::{LengthPart, RangeCache};

fn find_single_deletion(prev_children: &[NodeKey], pending_children: &[NodeKey]) -> Option<usize> {
    if prev_children.len() != pending_children.len() + 1 {
        return None;
    }
    let mut idx = 0;
    while idx < pending_children.len() && prev_children[idx] == pending_children[idx] {
        idx += 1;
    }
    if prev_children[idx + 1..] == pending_children[idx..] {
        Some(idx)
    } else {
        None
    }
}

pub fn plan(
    prev_state: &EditorState,
    pending_state: &EditorState,
    dirty_keys: &[NodeKey],
    range_cache: &RangeCache,
) -> Option<DiffPlan> {
    for &parent in dirty_keys {
        let Some(prev_record) = prev_state.get(parent) else { continue };
        let Some(pending_record) = pending_state.get(parent) else { continue };
        if !matches!(prev_record.kind, NodeKind::Element { .. } | NodeKind::Root) {
            continue;
        }
        if prev_record.kind != pending_record.kind {
            continue;
        }

        let Some(idx) = find_single_deletion(&prev_record.children, &pending_record.children) else {
            continue;
        };
        let deleted_key = prev_record.children[idx];
        if pending_state.get(deleted_key).is_some() {
            continue;
        }

        let entry = range_cache.get(deleted_key)?;
        let range = entry.entire_range();
        let delta = -(entry.entire_len() as i64);

        let anchor = if idx > 0 {
            prev_record.children[idx - 1]
        } else {
            parent
        };

        let mut plan = DiffPlan::labeled(PathLabel::DeleteBlock);
        plan.instructions.push(Instruction::Delete(range));
        plan.length_deltas.push((parent, LengthPart::Children, delta));
        plan.location_shifts.push((anchor, delta));
        plan.prune_scope = PruneScope::Ancestor(deleted_key);
        plan.resort_document_order = true;
        plan.decorator_scope = DecoratorScope::Subtree(deleted_key);
        return Some(plan);
    }
    None
}
