//! §4.4 branch 9 / §4.5 — keyed-reorder: a parent's children are the same
//! key set as before, only the order changed. [`crate::keyed_diff`] finds
//! the longest run that can stay untouched (the LIS over previous
//! positions); only the remaining children are deleted from their old slot
//! and reinserted at their new one.
//!
//! Moved-child instructions are expressed in pre-edit (original) absolute
//! coordinates, same convention as every other classifier: an insert's
//! target is anchored to the nearest LIS-stable predecessor's untouched old
//! position plus the old lengths of any not-yet-placed moved siblings
//! between it and the predecessor. The applier's descending-delete /
//! ascending-insert tape sequencing (§4.6) composes these into the correct
//! final layout without the planner needing to simulate the buffer.

use std::collections::HashSet;

use crate::keyed_diff::{plan_keyed_reorder, KeyedDiffPlan};
use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey, NodeKind};
use crate::planner::render::render_subtree;
use crate::planner::{offset_entries, DecoratorScope, DiffPlan, Instruction};
use crate::range_cache::{RangeCache, RangeCacheEntry};

/// Translates `key`'s cached entry (and every descendant's, recursively) by
/// `delta`, appending the shifted copies to `out`. Used to re-home a stable
/// child's subtree after a reorder moved it without changing its content —
/// every field but `location` is carried over unchanged.
fn collect_shifted_subtree(
    state: &EditorState,
    range_cache: &RangeCache,
    key: NodeKey,
    delta: i64,
    out: &mut Vec<(NodeKey, RangeCacheEntry)>,
) {
    let Some(entry) = range_cache.get(key) else { return };
    let mut shifted = *entry;
    shifted.location = (shifted.location as i64 + delta).max(0) as u32;
    out.push((key, shifted));
    if let Some(record) = state.get(key) {
        for &child in &record.children {
            collect_shifted_subtree(state, range_cache, child, delta, out);
        }
    }
}

pub fn plan(
    prev_state: &EditorState,
    pending_state: &EditorState,
    dirty_keys: &[NodeKey],
    range_cache: &RangeCache,
    threshold_pct: u32,
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
        let prev_set: HashSet<_> = prev_record.children.iter().collect();
        let pending_set: HashSet<_> = pending_record.children.iter().collect();
        if prev_set != pending_set {
            continue;
        }

        let diff = plan_keyed_reorder(&prev_record.children, &pending_record.children, threshold_pct);
        let KeyedDiffPlan::Moves { stable_indices, moved_indices } = diff else {
            continue;
        };
        if moved_indices.is_empty() {
            continue;
        }
        let stable: HashSet<usize> = stable_indices.iter().copied().collect();

        let parent_entry = range_cache.get(parent)?;
        let parent_start = parent_entry.location + parent_entry.preamble_len;

        // Every child's final absolute location in the reordered layout,
        // computed up front from its (unchanged) cached `entire_len` —
        // reordering never changes a child's own length. Needed both to
        // re-home the stable children's cache entries below and as the
        // conceptual target for moved children.
        let mut final_locations: Vec<u32> = Vec::with_capacity(pending_record.children.len());
        {
            let mut cursor = parent_start;
            for &key in &pending_record.children {
                final_locations.push(cursor);
                cursor += range_cache.get(key)?.entire_len();
            }
        }

        let mut plan = DiffPlan::labeled(PathLabel::KeyedReorder);

        // Deletes, descending by old absolute start so earlier deletes in
        // the tape never shift positions this loop still needs to read.
        let mut deletes: Vec<(u32, u32)> = Vec::new();
        for &idx in &moved_indices {
            let key = pending_record.children[idx];
            let entry = range_cache.get(key)?;
            deletes.push((entry.location, entry.location + entry.entire_len()));
        }
        deletes.sort_by(|a, b| b.0.cmp(&a.0));
        for (start, end) in &deletes {
            plan.instructions
                .push(Instruction::Delete(*start as usize..*end as usize));
        }

        // Inserts, ascending by target position. The target is expressed
        // in original coordinates: the nearest stable predecessor's
        // untouched old end, plus the old lengths of moved siblings placed
        // between that predecessor and this child in the pending order.
        let mut inserts: Vec<(u32, NodeKey)> = Vec::new();
        let mut cursor = parent_start;
        let mut pending_moved_run: Vec<NodeKey> = Vec::new();
        for (idx, &key) in pending_record.children.iter().enumerate() {
            if stable.contains(&idx) {
                let entry = range_cache.get(key)?;
                cursor = entry.location + entry.entire_len();
                pending_moved_run.clear();
            } else {
                let mut target = cursor;
                for &prior in &pending_moved_run {
                    target += range_cache.get(prior)?.entire_len();
                }
                inserts.push((target, key));
                pending_moved_run.push(key);
            }
        }
        inserts.sort_by_key(|(pos, _)| *pos);

        for (target, key) in inserts {
            let rendered = render_subtree(pending_state, key);
            let entries = offset_entries(&rendered.entries, target);
            plan.instructions
                .push(Instruction::Insert(target as usize, rendered.attributed));
            plan.spliced_subtree.extend(entries);
        }

        // A reorder is a permutation, not a monotonic suffix shift: a
        // stable child's absolute location can move even though its own
        // content never changed, whenever a differently-sized moved
        // sibling now sits ahead of or behind it. That isn't expressible
        // as a single `location_shifts` suffix delta (the per-child deltas
        // aren't monotonic in document order), so every stable child whose
        // final location differs from its cached one is re-spliced here —
        // itself and its whole subtree translated by the same delta —
        // exactly as the moved children above are spliced fresh. Without
        // this, stale stable-child locations violate §3.2 invariant 4 as
        // soon as a moved sibling's length differs from what it displaced.
        for (idx, &key) in pending_record.children.iter().enumerate() {
            if !stable.contains(&idx) {
                continue;
            }
            let Some(old_entry) = range_cache.get(key) else { continue };
            let delta = final_locations[idx] as i64 - old_entry.location as i64;
            if delta == 0 {
                continue;
            }
            collect_shifted_subtree(pending_state, range_cache, key, delta, &mut plan.spliced_subtree);
        }

        plan.resort_document_order = true;
        plan.decorator_scope = DecoratorScope::Subtree(parent);
        return Some(plan);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_tree::{NodeRecord, TextFormat};

    #[test]
    fn s4_reorder_moves_only_the_non_lis_children() {
        let mut prev = EditorState::empty();
        let keys: Vec<NodeKey> = (1..=5).map(NodeKey).collect();
        let texts = ["A", "B", "C", "D", "E"];
        let mut root = prev.node_map.get(&NodeKey::ROOT).unwrap().clone();
        root.children = keys.clone();
        prev.node_map.insert(NodeKey::ROOT, root.clone());
        for (key, text) in keys.iter().zip(texts.iter()) {
            prev.node_map
                .insert(*key, NodeRecord::text(*key, NodeKey::ROOT, *text, TextFormat::default()));
        }

        let mut pending = prev.clone();
        let reordered = vec![keys[0], keys[2], keys[1], keys[4], keys[3]];
        let mut root2 = root;
        root2.children = reordered;
        pending.node_map.insert(NodeKey::ROOT, root2);

        let mut cache = RangeCache::new();
        for (i, key) in keys.iter().enumerate() {
            cache.insert(*key, RangeCacheEntry { location: i as u32, text_len: 1, ..Default::default() });
        }

        let dirty = [NodeKey::ROOT];
        let plan = plan(&prev, &pending, &dirty, &cache, 100).unwrap();

        let deletes: Vec<_> = plan
            .instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Delete(r) => Some(r.clone()),
                _ => None,
            })
            .collect();
        let inserts: Vec<_> = plan
            .instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Insert(at, content) => Some((*at, content.text.clone())),
                _ => None,
            })
            .collect();

        assert_eq!(deletes.len(), 2);
        assert_eq!(inserts.len(), 2);
        assert!(inserts.iter().any(|(_, t)| t == "C"));
        assert!(inserts.iter().any(|(_, t)| t == "E"));
    }

    #[test]
    fn stable_children_get_their_cached_location_re_homed_around_a_wider_moved_sibling() {
        // 11 children: a 3-byte child ("BIG") followed by ten 1-byte
        // children. Moving "BIG" from the front to the back shifts every
        // stable sibling's location left by 3 — uniform width children
        // would mask this (the reorder-move's own length always equals the
        // single-byte gap it left behind).
        let mut prev = EditorState::empty();
        let big = NodeKey(1);
        let stable_keys: Vec<NodeKey> = (2..=11).map(NodeKey).collect();
        let mut all = vec![big];
        all.extend(stable_keys.iter().copied());

        let mut root = prev.node_map.get(&NodeKey::ROOT).unwrap().clone();
        root.children = all.clone();
        prev.node_map.insert(NodeKey::ROOT, root.clone());
        prev.node_map
            .insert(big, NodeRecord::text(big, NodeKey::ROOT, "BIG", TextFormat::default()));
        for key in &stable_keys {
            prev.node_map
                .insert(*key, NodeRecord::text(*key, NodeKey::ROOT, "x", TextFormat::default()));
        }

        let mut pending = prev.clone();
        let mut reordered = stable_keys.clone();
        reordered.push(big);
        let mut root2 = root;
        root2.children = reordered;
        pending.node_map.insert(NodeKey::ROOT, root2);

        let mut cache = RangeCache::new();
        cache.insert(NodeKey::ROOT, RangeCacheEntry { children_len: 13, ..Default::default() });
        cache.insert(big, RangeCacheEntry { location: 0, text_len: 3, ..Default::default() });
        for (i, key) in stable_keys.iter().enumerate() {
            cache.insert(*key, RangeCacheEntry { location: 3 + i as u32, text_len: 1, ..Default::default() });
        }

        let dirty = [NodeKey::ROOT];
        let plan = plan(&prev, &pending, &dirty, &cache, 100).unwrap();

        let spliced: std::collections::HashMap<NodeKey, RangeCacheEntry> =
            plan.spliced_subtree.iter().copied().collect();

        for (i, key) in stable_keys.iter().enumerate() {
            let entry = spliced.get(key).expect("stable sibling must be re-spliced with its new location");
            assert_eq!(entry.location, i as u32, "stable sibling {key:?} should shift left by BIG's 3 bytes");
        }
    }

    #[test]
    fn above_threshold_defers_to_rebuild() {
        let mut prev = EditorState::empty();
        let keys: Vec<NodeKey> = (1..=10).map(NodeKey).collect();
        let mut root = prev.node_map.get(&NodeKey::ROOT).unwrap().clone();
        root.children = keys.clone();
        prev.node_map.insert(NodeKey::ROOT, root.clone());
        for key in &keys {
            prev.node_map
                .insert(*key, NodeRecord::text(*key, NodeKey::ROOT, "x", TextFormat::default()));
        }
        let mut pending = prev.clone();
        let mut reversed = keys.clone();
        reversed.reverse();
        let mut root2 = root;
        root2.children = reversed;
        pending.node_map.insert(NodeKey::ROOT, root2);

        let cache = RangeCache::new();
        let dirty = [NodeKey::ROOT];
        assert!(plan(&prev, &pending, &dirty, &cache, 10).is_none());
    }
}
