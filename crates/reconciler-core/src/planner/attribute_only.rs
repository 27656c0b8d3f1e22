//! §4.4 branch 4 — attribute-only: every dirty key's component lengths are
//! unchanged; only attribute-derivable output differs. No buffer length
//! change, no range-cache location rebuild.

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey, NodeTree};
use crate::planner::{union_ranges, DiffPlan, Instruction};
use crate::range_cache::RangeCache;

pub fn plan(
    prev_state: &EditorState,
    pending_state: &EditorState,
    dirty_keys: &[NodeKey],
    range_cache: &RangeCache,
) -> Option<DiffPlan> {
    if dirty_keys.is_empty() {
        return None;
    }

    let mut targets = Vec::new();
    for &key in dirty_keys {
        let prev_record = prev_state.get(key)?;
        let pending_record = pending_state.get(key)?;
        if prev_record.kind != pending_record.kind {
            return None;
        }
        if prev_record.text_part.len() != pending_record.text_part.len() {
            return None;
        }

        let format_changed = prev_record.format != pending_record.format;
        let attrs_changed =
            prev_state.attributed_attributes(key) != pending_state.attributed_attributes(key);
        if format_changed || attrs_changed {
            targets.push(key);
        }
    }
    if targets.is_empty() {
        return None;
    }

    let mut plan = DiffPlan::labeled(PathLabel::AttributeOnly);
    let mut ranges = Vec::new();
    for key in &targets {
        let entry = range_cache.get(*key)?;
        let text_start = (entry.location + entry.preamble_len + entry.children_len) as usize;
        let text_end = text_start + entry.text_len as usize;
        let attrs = pending_state.attributed_attributes(*key);
        plan.instructions
            .push(Instruction::SetAttributes(text_start..text_end, attrs));
        ranges.push(text_start..text_end);
    }
    for range in union_ranges(ranges) {
        plan.instructions.push(Instruction::FixAttributes(range));
    }
    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_tree::{NodeRecord, TextFormat};
    use crate::range_cache::RangeCacheEntry;

    #[test]
    fn s2_bold_toggle_emits_set_and_fix_attributes_only() {
        let mut prev = EditorState::empty();
        let key = NodeKey(1);
        prev.node_map
            .insert(key, NodeRecord::text(key, NodeKey::ROOT, "Hi", TextFormat::default()));

        let mut pending = prev.clone();
        let mut bold_format = TextFormat::default();
        bold_format.bold = true;
        pending
            .node_map
            .insert(key, NodeRecord::text(key, NodeKey::ROOT, "Hi", bold_format));

        let mut cache = RangeCache::new();
        cache.insert(key, RangeCacheEntry { location: 0, text_len: 2, ..Default::default() });

        let dirty = [key];
        let plan = plan(&prev, &pending, &dirty, &cache).unwrap();
        assert_eq!(
            plan.instructions
                .iter()
                .filter(|i| matches!(i, Instruction::SetAttributes(..)))
                .count(),
            1
        );
        assert_eq!(
            plan.instructions
                .iter()
                .filter(|i| matches!(i, Instruction::FixAttributes(..)))
                .count(),
            1
        );
        assert!(plan.length_deltas.is_empty());
    }

    #[test]
    fn text_length_change_is_not_attribute_only() {
        let mut prev = EditorState::empty();
        let key = NodeKey(1);
        prev.node_map
            .insert(key, NodeRecord::text(key, NodeKey::ROOT, "Hi", TextFormat::default()));
        let mut pending = prev.clone();
        pending
            .node_map
            .insert(key, NodeRecord::text(key, NodeKey::ROOT, "Hiya", TextFormat::default()));

        let cache = RangeCache::new();
        let dirty = [key];
        assert!(plan(&prev, &pending, &dirty, &cache).is_none());
    }
}
