//! §4.4 branch 8 — contiguous-replace: a run of one or more sibling
//! children under one parent changed shape (mixed inserts/deletes/edits)
//! but the surrounding siblings are untouched. The common-prefix/suffix
//! trim over the child-key lists narrows this to the smallest affected
//! span, which is re-rendered and swapped in as one delete + one insert.

use reconciler_buffer::AttributedString;

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey, NodeKind};
use crate::planner::render::render_subtree;
use crate::planner::{offset_entries, DecoratorScope, DiffPlan, Instruction, PruneScope};
use crate::range_cache::{LengthPart, RangeCache};

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
        if prev_record.children == pending_record.children {
            continue;
        }

        let prev_children = &prev_record.children;
        let pending_children = &pending_record.children;

        let mut prefix = 0usize;
        while prefix < prev_children.len()
            && prefix < pending_children.len()
            && prev_children[prefix] == pending_children[prefix]
        {
            prefix += 1;
        }
        let max_suffix = (prev_children.len() - prefix).min(pending_children.len() - prefix);
        let mut suffix = 0usize;
        while suffix < max_suffix
            && prev_children[prev_children.len() - 1 - suffix]
                == pending_children[pending_children.len() - 1 - suffix]
        {
            suffix += 1;
        }

        let old_range = &prev_children[prefix..prev_children.len() - suffix];
        let new_range = &pending_children[prefix..pending_children.len() - suffix];
        if old_range.is_empty() && new_range.is_empty() {
            continue;
        }

        // A pure permutation of the same key set is cheaper to express as
        // minimal moves; leave it for `keyed_reorder`.
        let old_set: std::collections::HashSet<_> = old_range.iter().collect();
        let new_set: std::collections::HashSet<_> = new_range.iter().collect();
        if old_range.len() == new_range.len() && old_set == new_set {
            continue;
        }

        let parent_entry = range_cache.get(parent)?;
        let mut abs_start = parent_entry.location + parent_entry.preamble_len;
        for &sibling in &prev_children[..prefix] {
            abs_start += range_cache.get(sibling)?.entire_len();
        }
        let mut abs_end = abs_start;
        for &sibling in old_range {
            abs_end += range_cache.get(sibling)?.entire_len();
        }

        let mut new_content = AttributedString::plain(String::new());
        let mut new_entries = Vec::new();
        for &child in new_range {
            let rendered = render_subtree(pending_state, child);
            let base = new_content.text.len();
            new_entries.extend(offset_entries(&rendered.entries, base as u32));
            new_content.text.push_str(&rendered.attributed.text);
            for (range, attrs) in rendered.attributed.spans {
                new_content
                    .spans
                    .push((range.start + base..range.end + base, attrs));
            }
            for (at, meta) in rendered.attributed.attachments {
                new_content.attachments.insert(at + base, meta);
            }
        }

        let spliced_subtree = offset_entries(&new_entries, abs_start);
        let delta = new_content.text.len() as i64 - (abs_end - abs_start) as i64;
        let anchor = if prefix > 0 { pending_children[prefix - 1] } else { parent };

        let mut plan = DiffPlan::labeled(PathLabel::ContiguousReplace);
        if abs_end > abs_start {
            plan.instructions
                .push(Instruction::Delete(abs_start as usize..abs_end as usize));
        }
        if !new_content.text.is_empty() {
            plan.instructions
                .push(Instruction::Insert(abs_start as usize, new_content));
        }
        plan.length_deltas.push((parent, LengthPart::Children, delta));
        plan.location_shifts.push((anchor, delta));
        plan.spliced_subtree = spliced_subtree;
        plan.prune_scope = PruneScope::Ancestor(parent);
        plan.resort_document_order = true;
        plan.decorator_scope = DecoratorScope::Subtree(parent);
        plan.block_level_targets = new_range.to_vec();
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
    fn replaces_middle_run_of_two_children_with_one() {
        let mut prev = EditorState::empty();
        let p1 = NodeKey(1);
        let t1 = NodeKey(2);
        let pa = NodeKey(3);
        let ta = NodeKey(4);
        let pb = NodeKey(5);
        let tb = NodeKey(6);
        let p3 = NodeKey(7);
        let t3 = NodeKey(8);

        let mut root = prev.node_map.get(&NodeKey::ROOT).unwrap().clone();
        root.children = vec![p1, pa, pb, p3];
        prev.node_map.insert(NodeKey::ROOT, root.clone());
        let mut para1 = NodeRecord::element(p1, NodeKey::ROOT, false);
        para1.children = vec![t1];
        prev.node_map.insert(p1, para1);
        prev.node_map
            .insert(t1, NodeRecord::text(t1, p1, "A", TextFormat::default()));
        let mut paraa = NodeRecord::element(pa, NodeKey::ROOT, false);
        paraa.children = vec![ta];
        prev.node_map.insert(pa, paraa);
        prev.node_map
            .insert(ta, NodeRecord::text(ta, pa, "X", TextFormat::default()));
        let mut parab = NodeRecord::element(pb, NodeKey::ROOT, false);
        parab.children = vec![tb];
        prev.node_map.insert(pb, parab);
        prev.node_map
            .insert(tb, NodeRecord::text(tb, pb, "Y", TextFormat::default()));
        let mut para3 = NodeRecord::element(p3, NodeKey::ROOT, false);
        para3.children = vec![t3];
        prev.node_map.insert(p3, para3);
        prev.node_map
            .insert(t3, NodeRecord::text(t3, p3, "Z", TextFormat::default()));

        let mut pending = prev.clone();
        let pc = NodeKey(9);
        let tc = NodeKey(10);
        let mut root2 = root;
        root2.children = vec![p1, pc, p3];
        pending.node_map.insert(NodeKey::ROOT, root2);
        pending.node_map.remove(&pa);
        pending.node_map.remove(&ta);
        pending.node_map.remove(&pb);
        pending.node_map.remove(&tb);
        let mut parac = NodeRecord::element(pc, NodeKey::ROOT, false);
        parac.children = vec![tc];
        pending.node_map.insert(pc, parac);
        pending
            .node_map
            .insert(tc, NodeRecord::text(tc, pc, "M", TextFormat::default()));

        let mut cache = RangeCache::new();
        cache.insert(p1, RangeCacheEntry { location: 0, text_len: 1, ..Default::default() });
        cache.insert(pa, RangeCacheEntry { location: 2, text_len: 1, ..Default::default() });
        cache.insert(pb, RangeCacheEntry { location: 4, text_len: 1, ..Default::default() });
        cache.insert(p3, RangeCacheEntry { location: 6, text_len: 1, ..Default::default() });

        let dirty = [NodeKey::ROOT];
        let plan = plan(&prev, &pending, &dirty, &cache).unwrap();
        assert_eq!(plan.instructions[0], Instruction::Delete(2..6));
        match &plan.instructions[1] {
            Instruction::Insert(at, content) => {
                assert_eq!(*at, 2);
                assert_eq!(content.text, "M");
            }
            other => panic!("expected Insert, got {other:?}"),
        }
        assert_eq!(plan.location_shifts, vec![(p1, -2)]);
        assert!(matches!(plan.prune_scope, PruneScope::Ancestor(key) if key == NodeKey::ROOT));
    }
}
