//! §4.4 branch 6 — insert-block: a single new subtree attached under an
//! existing parent at a known sibling position, with no other structural
//! change. Detected by finding a dirty key whose pending child list is the
//! previous list with exactly one brand-new key spliced in.

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey, NodeKind};
use crate::planner::render::render_subtree;
use crate::planner::{offset_entries, DecoratorScope, DiffPlan, Instruction};
use crate::range_cache::{LengthPart, RangeCache};

fn find_single_insertion(prev_children: &[NodeKey], pending_children: &[NodeKey]) -> Option<usize> {
    if pending_children.len() != prev_children.len() + 1 {
        return None;
    }
    let mut idx = 0;
    while idx < prev_children.len() && prev_children[idx] == pending_children[idx] {
        idx += 1;
    }
    if pending_children[idx + 1..] == prev_children[idx..] {
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

        let Some(idx) = find_single_insertion(&prev_record.children, &pending_record.children) else {
            continue;
        };
        let inserted_key = pending_record.children[idx];
        if prev_state.get(inserted_key).is_some() {
            // Key already existed elsewhere; this is a move, not an insert.
            continue;
        }

        let parent_entry = range_cache.get(parent)?;
        let mut at = parent_entry.location + parent_entry.preamble_len;
        for &sibling in &pending_record.children[..idx] {
            at += range_cache.get(sibling)?.entire_len();
        }

        let rendered = render_subtree(pending_state, inserted_key);
        let entries = offset_entries(&rendered.entries, at);
        let delta = rendered.attributed.len() as i64;

        let anchor = if idx > 0 {
            pending_record.children[idx - 1]
        } else {
            parent
        };

        let mut plan = DiffPlan::labeled(PathLabel::InsertBlock);
        plan.instructions
            .push(Instruction::Insert(at as usize, rendered.attributed));
        plan.length_deltas.push((parent, LengthPart::Children, delta));
        plan.location_shifts.push((anchor, delta));
        plan.spliced_subtree = entries;
        plan.resort_document_order = true;
        plan.decorator_scope = DecoratorScope::Subtree(inserted_key);
        plan.block_level_targets.push(inserted_key);
        return Some(plan);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_tree::{NodeRecord, TextFormat};
    use crate::range_cache::RangeCacheEntry;

    #[test]
    fn s3_insert_block_between_two_siblings() {
        let mut prev = EditorState::empty();
        let p1 = NodeKey(1);
        let t1 = NodeKey(2);
        let p2 = NodeKey(3);
        let t2 = NodeKey(4);
        let mut root = prev.node_map.get(&NodeKey::ROOT).unwrap().clone();
        root.children = vec![p1, p2];
        prev.node_map.insert(NodeKey::ROOT, root.clone());
        let mut para1 = NodeRecord::element(p1, NodeKey::ROOT, false);
        para1.children = vec![t1];
        prev.node_map.insert(p1, para1);
        prev.node_map
            .insert(t1, NodeRecord::text(t1, p1, "A", TextFormat::default()));
        let mut para2 = NodeRecord::element(p2, NodeKey::ROOT, false);
        para2.children = vec![t2];
        prev.node_map.insert(p2, para2);
        prev.node_map
            .insert(t2, NodeRecord::text(t2, p2, "C", TextFormat::default()));

        let mut pending = prev.clone();
        let p15 = NodeKey(5);
        let t15 = NodeKey(6);
        let mut root2 = root;
        root2.children = vec![p1, p15, p2];
        pending.node_map.insert(NodeKey::ROOT, root2);
        let mut para15 = NodeRecord::element(p15, NodeKey::ROOT, false);
        para15.children = vec![t15];
        pending.node_map.insert(p15, para15);
        pending
            .node_map
            .insert(t15, NodeRecord::text(t15, p15, "B", TextFormat::default()));

        let mut cache = RangeCache::new();
        cache.insert(NodeKey::ROOT, RangeCacheEntry { children_len: 3, ..Default::default() });
        cache.insert(p1, RangeCacheEntry { location: 0, text_len: 1, ..Default::default() });
        cache.insert(t1, RangeCacheEntry { location: 0, text_len: 1, ..Default::default() });
        cache.insert(p2, RangeCacheEntry { location: 2, text_len: 1, ..Default::default() });
        cache.insert(t2, RangeCacheEntry { location: 2, text_len: 1, ..Default::default() });

        let dirty = [NodeKey::ROOT];
        let plan = plan(&prev, &pending, &dirty, &cache).unwrap();
        match &plan.instructions[0] {
            Instruction::Insert(at, content) => {
                assert_eq!(*at, 2);
                assert_eq!(content.text, "B");
            }
            other => panic!("expected Insert, got {other:?}"),
        }
        assert_eq!(plan.location_shifts, vec![(p1, 1)]);
    }
}
