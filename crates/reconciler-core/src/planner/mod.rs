//! C4 — the diff planner. `classify` is the single entry point: given the
//! previous and pending states plus the dirty-key set, it tries each
//! classifier in §4.4's priority order and returns the plan of the first one
//! that applies, falling through to [`rebuild::plan`] (infallible) if none
//! do.

use std::ops::Range;

use reconciler_buffer::{AttributeMap, AttributedString, BlockLevelAttributes};

use crate::composition::{CompositionState, MarkedTextOperation};
use crate::config::ReconcilerConfig;
use crate::metrics::PathLabel;
use crate::node_tree::{EditorState, NodeKey};
use crate::range_cache::{LengthPart, RangeCache, RangeCacheEntry};

pub mod attribute_only;
pub mod composition;
pub mod contiguous_replace;
pub mod delete_block;
pub mod hydrate;
pub mod insert_block;
pub mod keyed_reorder;
pub mod pre_post_only;
pub mod rebuild;
pub mod render;
pub mod single_text_edit;

/// One tape entry (§3.1). The applier executes a coalesced, ordered tape
/// built from these.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Delete(Range<usize>),
    Insert(usize, AttributedString),
    SetAttributes(Range<usize>, AttributeMap),
    FixAttributes(Range<usize>),
    DecoratorOp(NodeKey, DecoratorOpKind),
    ApplyBlockAttributes(NodeKey, BlockLevelAttributes),
}

/// §4.6 decorator reconciliation outcomes, carried as tape entries so the
/// applier's decorator step and the plan's instruction list agree on what
/// happened even before the position cache is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorOpKind {
    Add,
    Remove,
    Decorate,
    Move,
}

/// Which keys the applier should drop from the range cache once the tape
/// has landed (§4.3 `prune_globally` / `prune_under_ancestor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruneScope {
    #[default]
    None,
    Ancestor(NodeKey),
    Global,
}

/// Which subtree the applier should run §4.6 decorator reconciliation over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoratorScope {
    #[default]
    None,
    Subtree(NodeKey),
}

/// The planner's output: an instruction tape plus everything the applier
/// needs to bring the range cache, document order, and decorator caches
/// back into sync with `pending_state` (§4.4–§4.6).
#[derive(Debug, Clone, Default)]
pub struct DiffPlan {
    pub path_label: Option<PathLabel>,
    pub instructions: Vec<Instruction>,
    /// §4.3 `apply_length_deltas_batch` input: per-node component-length
    /// changes, applied (with ancestor propagation) before any location
    /// shift is finalized.
    pub length_deltas: Vec<(NodeKey, LengthPart, i64)>,
    /// §4.3 `apply_incremental_location_shifts` input: `(start_key, delta)`
    /// pairs, one per distinct shift point this update introduces. A single
    /// fast path usually contributes one; keyed-reorder may contribute
    /// several.
    pub location_shifts: Vec<(NodeKey, i64)>,
    /// Range-cache entries for a newly rendered subtree, absolute locations
    /// already baked in by the classifier that built them (§4.4 steps 6,
    /// 8, 9, 10). Spliced into the cache before pruning and resorting.
    pub spliced_subtree: Vec<(NodeKey, RangeCacheEntry)>,
    pub prune_scope: PruneScope,
    /// Set whenever the live key set changed shape (insert/delete/replace).
    /// The applier resorts the whole document-order vector by
    /// `(location asc, entire_len desc)` rather than computing precise
    /// splice indices — §9 records this as a deliberate simplification
    /// against the spec's more surgical index-patch option.
    pub resort_document_order: bool,
    pub decorator_scope: DecoratorScope,
    pub block_level_targets: Vec<NodeKey>,
}

impl DiffPlan {
    pub fn labeled(path_label: PathLabel) -> Self {
        DiffPlan {
            path_label: Some(path_label),
            ..Default::default()
        }
    }
}

/// Merges a set of `Range<usize>` into their union, sorted and
/// non-overlapping — used by classifiers building the §4.4 "one minimal
/// `FixAttributes` over the union of changed ranges" instruction.
pub(crate) fn union_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if let Some(last) = merged.last_mut() {
            if range.start <= last.end {
                last.end = last.end.max(range.end);
                continue;
            }
        }
        merged.push(range);
    }
    merged
}

/// Shifts a subtree's renderer output (entries are 0-based relative to the
/// start of the rendered text) to absolute buffer coordinates.
pub(crate) fn offset_entries(
    entries: &[(NodeKey, RangeCacheEntry)],
    base: u32,
) -> Vec<(NodeKey, RangeCacheEntry)> {
    entries
        .iter()
        .map(|&(key, mut entry)| {
            entry.location += base;
            (key, entry)
        })
        .collect()
}

/// C4 classification (§4.4): evaluated in priority order, first match wins.
/// `composition` is consulted (not mutated) only to decide whether the
/// composition fast path should run; the caller applies the resulting
/// `CompositionState` transition separately via `composition::apply`.
#[allow(clippy::too_many_arguments)]
pub fn classify(
    prev_state: &EditorState,
    pending_state: &EditorState,
    dirty_keys: &[NodeKey],
    range_cache: &RangeCache,
    buffer_len: usize,
    marked_text_op: Option<&MarkedTextOperation>,
    composition_state: &CompositionState,
    config: &ReconcilerConfig,
) -> DiffPlan {
    if buffer_len == 0 {
        if let Some(plan) = hydrate::plan(pending_state) {
            return plan;
        }
    }

    if let Some(op) = marked_text_op {
        if let Some(plan) = composition::plan(pending_state, range_cache, op) {
            return plan;
        }
    }

    if !config.use_optimized_reconciler {
        return rebuild::plan(prev_state, pending_state, range_cache);
    }

    if let Some(plan) = single_text_edit::plan(prev_state, pending_state, dirty_keys, range_cache) {
        return plan;
    }

    if let Some(plan) = attribute_only::plan(prev_state, pending_state, dirty_keys, range_cache) {
        return plan;
    }

    if config.use_pre_post_attributes_only {
        if let Some(plan) = pre_post_only::plan(
            prev_state,
            pending_state,
            dirty_keys,
            range_cache,
            config.pre_post_attrs_only_max_targets,
        ) {
            return plan;
        }
    }

    if config.use_insert_block_fenwick {
        if let Some(plan) = insert_block::plan(prev_state, pending_state, dirty_keys, range_cache) {
            return plan;
        }
    }

    if config.use_delete_block_fenwick {
        if let Some(plan) = delete_block::plan(prev_state, pending_state, dirty_keys, range_cache) {
            return plan;
        }
    }

    if let Some(plan) = contiguous_replace::plan(prev_state, pending_state, dirty_keys, range_cache) {
        return plan;
    }

    if config.use_keyed_diff {
        if let Some(plan) = keyed_reorder::plan(
            prev_state,
            pending_state,
            dirty_keys,
            range_cache,
            config.keyed_diff_stability_threshold_pct,
        ) {
            return plan;
        }
    }

    // Suppress unused-state warning on the composition-state parameter when
    // no other branch consulted it (e.g. `use_optimized_reconciler` false).
    let _ = composition_state;

    rebuild::plan(prev_state, pending_state, range_cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_ranges_merges_overlapping_and_adjacent() {
        let merged = union_ranges(vec![0..3, 2..5, 10..12]);
        assert_eq!(merged, vec![0..5, 10..12]);
    }

    #[test]
    fn offset_entries_adds_base_to_every_location() {
        let entries = vec![(NodeKey(1), RangeCacheEntry { location: 2, text_len: 3, ..Default::default() })];
        let shifted = offset_entries(&entries, 10);
        assert_eq!(shifted[0].1.location, 12);
    }
}
