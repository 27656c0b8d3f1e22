//! §4.4 branch 5 — preamble/postamble-only: one or more dirty keys whose
//! `text_part` and children are unchanged, but `preamble`/`postamble` output
//! differs. Splits further into an attribute-only sub-path (lengths
//! unchanged) and a targeted delete/insert sub-path (lengths changed).
//!
//! All instructions below use pre-edit (original) absolute buffer
//! coordinates; the applier's tape-sequencing step (§4.6) is responsible for
//! transforming them through prior deletes/inserts in the same update, so
//! classifiers never need to reason about edit ordering themselves.

use reconciler_buffer::AttributedString;

use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey, NodeTree};
use crate::planner::{union_ranges, DiffPlan, Instruction};
use crate::range_cache::{LengthPart, RangeCache};

struct Changed {
    key: NodeKey,
    prev_pre: String,
    pending_pre: String,
    prev_post: String,
    pending_post: String,
}

pub fn plan(
    prev_state: &EditorState,
    pending_state: &EditorState,
    dirty_keys: &[NodeKey],
    range_cache: &RangeCache,
    max_targets: u32,
) -> Option<DiffPlan> {
    if dirty_keys.is_empty() {
        return None;
    }

    let mut changed = Vec::new();
    for &key in dirty_keys {
        let prev_record = prev_state.get(key)?;
        let pending_record = pending_state.get(key)?;
        if prev_record.kind != pending_record.kind || prev_record.text_part != pending_record.text_part {
            return None;
        }

        let prev_pre = prev_state.preamble(key);
        let pending_pre = pending_state.preamble(key);
        let prev_post = prev_state.postamble(key);
        let pending_post = pending_state.postamble(key);
        if prev_pre == pending_pre && prev_post == pending_post {
            continue;
        }
        changed.push(Changed {
            key,
            prev_pre,
            pending_pre,
            prev_post,
            pending_post,
        });
    }
    if changed.is_empty() {
        return None;
    }

    let all_length_unchanged = changed
        .iter()
        .all(|c| c.prev_pre.len() == c.pending_pre.len() && c.prev_post.len() == c.pending_post.len());

    if all_length_unchanged {
        if changed.len() as u32 > max_targets {
            return None;
        }
        let mut plan = DiffPlan::labeled(PathLabel::PrePostOnly);
        let mut ranges = Vec::new();
        for c in &changed {
            let entry = range_cache.get(c.key)?;
            let pre_range = entry.location as usize..(entry.location + entry.preamble_len) as usize;
            let post_start = entry.location + entry.preamble_len + entry.children_len + entry.text_len;
            let post_range = post_start as usize..(post_start + entry.postamble_len) as usize;
            let attrs = pending_state.attributed_attributes(c.key);
            if !pre_range.is_empty() {
                plan.instructions
                    .push(Instruction::SetAttributes(pre_range.clone(), attrs.clone()));
                ranges.push(pre_range);
            }
            if !post_range.is_empty() {
                plan.instructions
                    .push(Instruction::SetAttributes(post_range.clone(), attrs));
                ranges.push(post_range);
            }
        }
        for range in union_ranges(ranges) {
            plan.instructions.push(Instruction::FixAttributes(range));
        }
        return Some(plan);
    }

    let mut plan = DiffPlan::labeled(PathLabel::PrePostOnly);
    let mut fix_ranges = Vec::new();
    for c in &changed {
        let entry = range_cache.get(c.key)?;
        let mut total_delta = 0i64;

        if c.prev_pre != c.pending_pre {
            let range = entry.location as usize..(entry.location + entry.preamble_len) as usize;
            if !range.is_empty() {
                plan.instructions.push(Instruction::Delete(range.clone()));
            }
            if !c.pending_pre.is_empty() {
                plan.instructions
                    .push(Instruction::Insert(range.start, AttributedString::plain(c.pending_pre.clone())));
            }
            let delta = c.pending_pre.len() as i64 - c.prev_pre.len() as i64;
            plan.length_deltas.push((c.key, LengthPart::Preamble, delta));
            total_delta += delta;
            fix_ranges.push(range.start..range.start + c.pending_pre.len());
        }

        if c.prev_post != c.pending_post {
            let post_start = entry.location + entry.preamble_len + entry.children_len + entry.text_len;
            let range = post_start as usize..(post_start + entry.postamble_len) as usize;
            if !range.is_empty() {
                plan.instructions.push(Instruction::Delete(range.clone()));
            }
            if !c.pending_post.is_empty() {
                plan.instructions
                    .push(Instruction::Insert(range.start, AttributedString::plain(c.pending_post.clone())));
            }
            let delta = c.pending_post.len() as i64 - c.prev_post.len() as i64;
            plan.length_deltas.push((c.key, LengthPart::Postamble, delta));
            total_delta += delta;
            fix_ranges.push(range.start..range.start + c.pending_post.len());
        }

        if total_delta != 0 {
            plan.location_shifts.push((c.key, total_delta));
        }
    }
    for range in union_ranges(fix_ranges) {
        plan.instructions.push(Instruction::FixAttributes(range));
    }
    Some(plan)
}
