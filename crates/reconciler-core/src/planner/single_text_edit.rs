//! §4.4 branch 3 — single-text-edit: exactly one dirty key, a Text node,
//! only its `text_part` changed. The minimal edit is the longest-common-
//! prefix/suffix diff against the previous text, so a one-character
//! append/insert/delete produces a one-character tape entry rather than a
//! whole-node replace.

use reconciler_buffer::AttributedString;

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey, NodeKind};
use crate::planner::{DiffPlan, Instruction};
use crate::range_cache::{LengthPart, RangeCache};

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

fn common_suffix_len(a: &str, b: &str, max: usize) -> usize {
    let mut len = 0usize;
    for (x, y) in a.chars().rev().zip(b.chars().rev()) {
        if x != y {
            break;
        }
        let next = len + x.len_utf8();
        if next > max {
            break;
        }
        len = next;
    }
    len
}

pub fn plan(
    prev_state: &EditorState,
    pending_state: &EditorState,
    dirty_keys: &[NodeKey],
    range_cache: &RangeCache,
) -> Option<DiffPlan> {
    let [key] = dirty_keys else { return None };
    let key = *key;

    let prev_record = prev_state.get(key)?;
    let pending_record = pending_state.get(key)?;
    if prev_record.kind != NodeKind::Text || pending_record.kind != NodeKind::Text {
        return None;
    }
    if prev_record.format != pending_record.format {
        return None;
    }

    let prev_text = prev_record.text();
    let pending_text = pending_record.text();
    if prev_text == pending_text {
        return None;
    }

    let entry = range_cache.get(key)?;
    let text_start = (entry.location + entry.preamble_len + entry.children_len) as usize;

    let prefix_len = common_prefix_len(prev_text, pending_text);
    let remaining_prev = prev_text.len() - prefix_len;
    let remaining_pending = pending_text.len() - prefix_len;
    let suffix_len = common_suffix_len(
        &prev_text[prefix_len..],
        &pending_text[prefix_len..],
        remaining_prev.min(remaining_pending),
    );

    let old_middle_start = prefix_len;
    let old_middle_end = prev_text.len() - suffix_len;
    let new_middle = &pending_text[prefix_len..pending_text.len() - suffix_len];

    let abs_start = text_start + old_middle_start;
    let abs_end = text_start + old_middle_end;
    let delta = pending_text.len() as i64 - prev_text.len() as i64;

    let mut plan = DiffPlan::labeled(PathLabel::SingleTextEdit);
    if abs_end > abs_start {
        plan.instructions.push(Instruction::Delete(abs_start..abs_end));
    }
    if !new_middle.is_empty() {
        plan.instructions
            .push(Instruction::Insert(abs_start, AttributedString::plain(new_middle)));
    }
    plan.instructions
        .push(Instruction::FixAttributes(abs_start..abs_start + new_middle.len()));
    plan.length_deltas.push((key, LengthPart::Text, delta));
    if delta != 0 {
        plan.location_shifts.push((key, delta));
    }
    Some(plan)
}
