//! §4.4 branch 2 / §4.7 — the IME marked-text fast path. Protocol validation
//! (is this `create`/`update` op consistent with the current composition
//! state?) lives in [`crate::composition::CompositionState`]; this module
//! only turns an already-accepted operation into a tape.

use reconciler_buffer::AttributedString;

use crate::composition::MarkedTextOperation;
use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeTree};
use crate::range_cache::{LengthPart, RangeCache};
use crate::planner::{DiffPlan, Instruction};

/// Builds the Delete+Insert pair for one marked-text operation, whether it
/// is starting, updating, or (via the caller passing an empty
/// `replace_range` and the committed text) ending a composition.
pub fn plan(
    pending_state: &EditorState,
    range_cache: &RangeCache,
    op: &MarkedTextOperation,
) -> Option<DiffPlan> {
    let entry = range_cache.get(op.owner)?;
    let text_start = (entry.location + entry.preamble_len + entry.children_len) as usize;
    let abs_start = text_start + op.replace_range.start;
    let abs_end = text_start + op.replace_range.end;

    let attrs = pending_state.attributed_attributes(op.owner);
    let mut content = AttributedString::plain(op.text.clone());
    if !attrs.is_empty() && !content.text.is_empty() {
        content.spans.push((0..content.text.len(), attrs));
    }

    let delta = content.text.len() as i64 - (abs_end - abs_start) as i64;

    let mut plan = DiffPlan::labeled(PathLabel::Composition);
    if abs_end > abs_start {
        plan.instructions.push(Instruction::Delete(abs_start..abs_end));
    }
    if !content.text.is_empty() {
        plan.instructions.push(Instruction::Insert(abs_start, content));
    }
    plan.instructions.push(Instruction::FixAttributes(
        abs_start..abs_start + op.text.len(),
    ));
    plan.length_deltas.push((op.owner, LengthPart::Text, delta));
    if delta != 0 {
        plan.location_shifts.push((op.owner, delta));
    }
    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_tree::NodeKey;
    use crate::range_cache::RangeCacheEntry;

    #[test]
    fn composition_start_inserts_marked_text_at_owner_start() {
        let state = EditorState::empty();
        let owner = NodeKey(1);
        let mut cache = RangeCache::new();
        cache.insert(owner, RangeCacheEntry::default());

        let op = MarkedTextOperation {
            create: true,
            owner,
            replace_range: 0..0,
            text: "か".to_string(),
            internal_selection: 0..1,
        };

        let plan = plan(&state, &cache, &op).unwrap();
        assert!(matches!(&plan.instructions[0], Instruction::Insert(0, content) if content.text == "か"));
        assert_eq!(plan.length_deltas[0].2, "か".len() as i64);
    }

    #[test]
    fn composition_update_replaces_previous_marked_range() {
        let state = EditorState::empty();
        let owner = NodeKey(1);
        let mut cache = RangeCache::new();
        cache.insert(owner, RangeCacheEntry::default());

        let op = MarkedTextOperation {
            create: false,
            owner,
            replace_range: 0.."か".len(),
            text: "か゛".to_string(),
            internal_selection: 0..2,
        };

        let plan = plan(&state, &cache, &op).unwrap();
        assert!(matches!(&plan.instructions[0], Instruction::Delete(r) if *r == (0.."か".len())));
    }
}
