//! C6 — the instruction applier. Takes one [`DiffPlan`] and a `&mut
//! AttributedBuffer`/`&mut RangeCache`/`&mut DecoratorPositionCache` triple
//! and lands it: coalesce the tape, open one buffer edit session, apply
//! deletes (descending) then inserts/attribute ops (ascending, §4.6), fold
//! length/location changes into the range cache (§4.3, §4.8), splice and
//! prune, reconcile decorators, and apply block-level paragraph style.
//!
//! Every classifier hands the applier instructions in pre-edit (original)
//! absolute buffer coordinates. `AttributedBuffer::replace` only ever
//! mutates one range at a time, so before touching the buffer this module
//! resequences the tape: it coalesces overlapping/duplicate deletes and
//! same-position inserts, then derives an `adjust_start` function from that
//! coalesced set that maps any other pre-edit coordinate to its position in
//! the buffer as it will exist once the deletes-then-inserts have landed.

use std::collections::BTreeMap;
use std::ops::Range;

use reconciler_buffer::{AttributeMap, AttributedBuffer, AttributedString};

use crate::decorators::{self, DecoratorLifecycle, DecoratorPositionCache};
use crate::error::ReconcileError;
use crate::metrics::ReconcileMetrics;
use crate::node_tree::{EditorState, NodeKey, NodeKind, NodeTree};
use crate::planner::{union_ranges, DecoratorScope, DiffPlan, Instruction, PruneScope};
use crate::range_cache::RangeCache;

/// Lands `plan` against the live buffer and caches. `prev_state` is only
/// needed for decorator-subtree discovery and ancestor-scoped pruning;
/// everything else in the plan is already self-contained.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_plan(
    buffer: &mut AttributedBuffer,
    range_cache: &mut RangeCache,
    decorator_cache: &mut DecoratorPositionCache,
    prev_state: &EditorState,
    pending_state: &EditorState,
    plan: DiffPlan,
    config: &crate::config::ReconcilerConfig,
    metrics: &mut ReconcileMetrics,
) -> Result<(), ReconcileError> {
    let tape = CoalescedTape::build(&plan.instructions);

    buffer.begin_edit()?;
    let result = apply_tape(buffer, &tape, metrics);
    // Always close the session we opened, even if an op failed partway —
    // leaving it open would make every subsequent update fail with
    // `SessionAlreadyOpen` instead of surfacing the real error.
    buffer.end_edit()?;
    result?;

    update_range_cache(range_cache, prev_state, pending_state, &plan, config);

    reconcile_decorators(range_cache, decorator_cache, prev_state, pending_state, &plan);

    apply_block_styles(buffer, range_cache, pending_state, &plan)?;

    Ok(())
}

/// The tape after coalescing (§4.6): deletes merged and sorted descending,
/// inserts merged by position and sorted ascending, attribute sets grouped
/// by identical attribute map, fix ranges unioned.
struct CoalescedTape {
    /// Ascending, non-overlapping, for computing `adjust_start`.
    deletes_ascending: Vec<Range<usize>>,
    /// Descending, for physical application.
    deletes_descending: Vec<Range<usize>>,
    /// Original position + byte length, used to compute `adjust_start`.
    insert_widths: Vec<(usize, usize)>,
    /// Ascending by original position, content ready to apply.
    inserts: Vec<(usize, AttributedString)>,
    set_attributes: Vec<(Range<usize>, AttributeMap)>,
    fix_ranges: Vec<Range<usize>>,
}

impl CoalescedTape {
    fn build(instructions: &[Instruction]) -> Self {
        let mut raw_deletes: std::collections::HashSet<(usize, usize)> = std::collections::HashSet::new();
        let mut insert_order: Vec<usize> = Vec::new();
        let mut insert_map: BTreeMap<usize, AttributedString> = BTreeMap::new();
        let mut raw_set_attrs: Vec<(Range<usize>, AttributeMap)> = Vec::new();
        let mut raw_fix_ranges: Vec<Range<usize>> = Vec::new();

        for instruction in instructions {
            match instruction {
                Instruction::Delete(range) => {
                    raw_deletes.insert((range.start, range.end));
                }
                Instruction::Insert(at, content) => {
                    if let Some(existing) = insert_map.get_mut(at) {
                        let base = existing.text.len();
                        existing.text.push_str(&content.text);
                        existing
                            .spans
                            .extend(content.spans.iter().map(|(r, a)| ((r.start + base)..(r.end + base), a.clone())));
                        existing
                            .attachments
                            .extend(content.attachments.iter().map(|(at, meta)| (at + base, meta.clone())));
                    } else {
                        insert_order.push(*at);
                        insert_map.insert(*at, content.clone());
                    }
                }
                Instruction::SetAttributes(range, attrs) => {
                    raw_set_attrs.push((range.clone(), attrs.clone()));
                }
                Instruction::FixAttributes(range) => {
                    raw_fix_ranges.push(range.clone());
                }
                // No classifier constructs these (decorator/block-style
                // reconciliation runs as separate post-tape passes driven by
                // `decorator_scope`/`block_level_targets`), but the applier
                // still drains them defensively rather than assuming it.
                Instruction::DecoratorOp(..) | Instruction::ApplyBlockAttributes(..) => {}
            }
        }

        let deletes_ascending = union_ranges(raw_deletes.into_iter().map(|(s, e)| s..e).collect());
        let mut deletes_descending = deletes_ascending.clone();
        deletes_descending.sort_by(|a, b| b.start.cmp(&a.start));

        insert_order.sort_unstable();
        insert_order.dedup();
        let insert_widths: Vec<(usize, usize)> = insert_order
            .iter()
            .map(|at| (*at, insert_map.get(at).map(|s| s.text.len()).unwrap_or(0)))
            .collect();
        let inserts: Vec<(usize, AttributedString)> = insert_order
            .into_iter()
            .map(|at| (at, insert_map.remove(&at).unwrap()))
            .collect();

        let mut set_groups: Vec<(AttributeMap, Vec<Range<usize>>)> = Vec::new();
        for (range, attrs) in raw_set_attrs {
            if let Some(group) = set_groups.iter_mut().find(|(a, _)| *a == attrs) {
                group.1.push(range);
            } else {
                set_groups.push((attrs, vec![range]));
            }
        }
        let set_attributes: Vec<(Range<usize>, AttributeMap)> = set_groups
            .into_iter()
            .flat_map(|(attrs, ranges)| {
                union_ranges(ranges)
                    .into_iter()
                    .map(move |r| (r, attrs.clone()))
            })
            .collect();

        let fix_ranges = union_ranges(raw_fix_ranges);

        CoalescedTape {
            deletes_ascending,
            deletes_descending,
            insert_widths,
            inserts,
            set_attributes,
            fix_ranges,
        }
    }

    /// Maps a pre-edit coordinate to its position once every coalesced
    /// delete/insert in this tape has landed, counting only contributions
    /// strictly before `pos` (so a range's own delete/insert pair, which
    /// starts at or after the range's own start, never shifts itself).
    fn adjust_start(&self, pos: usize) -> usize {
        let mut shift: i64 = 0;
        for d in &self.deletes_ascending {
            if d.start < pos {
                let overlap = d.end.min(pos) - d.start;
                shift -= overlap as i64;
            }
        }
        for &(at, width) in &self.insert_widths {
            if at < pos {
                shift += width as i64;
            }
        }
        (pos as i64 + shift).max(0) as usize
    }

    /// Adjusts a (start, width) pair that already reflects its own change
    /// in its width — see the module doc comment.
    fn adjust_preserving_width(&self, range: &Range<usize>) -> Range<usize> {
        let width = range.end.saturating_sub(range.start);
        let start = self.adjust_start(range.start);
        start..start + width
    }
}

fn apply_tape(buffer: &mut AttributedBuffer, tape: &CoalescedTape, metrics: &mut ReconcileMetrics) -> Result<(), ReconcileError> {
    for range in &tape.deletes_descending {
        if range.end > range.start {
            buffer.replace(range.clone(), &AttributedString::plain(""))?;
            metrics.deletes += 1;
            metrics.chars_deleted += (range.end - range.start) as u32;
        }
    }

    for &(at, _) in &tape.insert_widths {
        let content = tape
            .inserts
            .iter()
            .find(|(pos, _)| *pos == at)
            .map(|(_, c)| c)
            .expect("insert_widths and inserts share the same key set");
        if content.is_empty() {
            continue;
        }
        let target = tape.adjust_start(at);
        buffer.replace(target..target, content)?;
        metrics.inserts += 1;
        metrics.chars_added += content.len() as u32;
    }

    for (range, attrs) in &tape.set_attributes {
        let adjusted = tape.adjust_preserving_width(range);
        if adjusted.start == adjusted.end {
            continue;
        }
        buffer.set_attributes(adjusted, attrs.clone())?;
        metrics.set_attributes += 1;
    }

    for range in &tape.fix_ranges {
        let adjusted = tape.adjust_preserving_width(range);
        if adjusted.start == adjusted.end {
            continue;
        }
        buffer.fix_attributes(adjusted)?;
        metrics.fix_attributes += 1;
    }

    Ok(())
}

/// §4.3/§4.8: fold length deltas (with ancestor propagation) and location
/// shifts into the range cache, splice in newly rendered entries, prune
/// stale ones, and resort document order if the plan calls for it. Order
/// matters here: shifts are applied to the *surviving* entries before new
/// ones are spliced in, so a freshly rendered subtree's already-correct
/// absolute locations are never shifted a second time.
fn update_range_cache(
    range_cache: &mut RangeCache,
    prev_state: &EditorState,
    pending_state: &EditorState,
    plan: &DiffPlan,
    config: &crate::config::ReconcilerConfig,
) {
    if !plan.length_deltas.is_empty() {
        range_cache.apply_length_deltas_batch(pending_state, &plan.length_deltas);
    }

    if !plan.location_shifts.is_empty() {
        let mut shifts: BTreeMap<NodeKey, i64> = BTreeMap::new();
        for &(key, delta) in &plan.location_shifts {
            *shifts.entry(key).or_insert(0) += delta;
        }
        if config.use_fenwick_delta {
            range_cache.apply_location_shifts_via_fenwick(&shifts);
        } else {
            range_cache.apply_incremental_location_shifts(&shifts);
        }
    }

    if !plan.spliced_subtree.is_empty() {
        range_cache.splice_subtree(&plan.spliced_subtree);
    }

    match plan.prune_scope {
        PruneScope::None => {}
        PruneScope::Global => {
            range_cache.prune_globally(pending_state);
        }
        PruneScope::Ancestor(ancestor) => {
            range_cache.prune_under_ancestor(ancestor, prev_state, pending_state);
        }
    }

    if plan.resort_document_order {
        range_cache.rebuild_document_order();
    }
}

/// Collects the `Decorator`-kind keys under `root` (inclusive) in a state,
/// in document order, for feeding [`decorators::lifecycle_transitions`].
fn decorator_keys_under(state: &EditorState, root: NodeKey) -> Vec<NodeKey> {
    let mut stack = vec![root];
    let mut found = Vec::new();
    while let Some(key) = stack.pop() {
        let Some(record) = state.get(key) else { continue };
        if record.kind == NodeKind::Decorator {
            found.push(key);
        }
        stack.extend(record.children.iter().rev().copied());
    }
    found
}

/// Runs §4.6 decorator lifecycle reconciliation within `plan.decorator_scope`
/// (mount/decorate/unmount), then — regardless of scope, since even a plan
/// with no scope at all (`single_text_edit`, `attribute_only`,
/// `pre_post_only`) can still shift the absolute location of a decorator
/// living elsewhere in the document as a side effect of its edit — resyncs
/// every decorator the cache already knows about against the now-current
/// range cache, so a location drift outside the scoped subtree never goes
/// undetected (§8.1 invariant 6).
fn reconcile_decorators(
    range_cache: &RangeCache,
    decorator_cache: &mut DecoratorPositionCache,
    prev_state: &EditorState,
    pending_state: &EditorState,
    plan: &DiffPlan,
) {
    if let DecoratorScope::Subtree(root) = plan.decorator_scope {
        let prev_keys = decorator_keys_under(prev_state, root);
        let pending_keys = decorator_keys_under(pending_state, root);

        for (key, transition) in decorators::lifecycle_transitions(&prev_keys, &pending_keys) {
            match transition {
                DecoratorLifecycle::Mount | DecoratorLifecycle::Decorate => {
                    if let Some(entry) = range_cache.get(key) {
                        decorator_cache.set(key, entry.location);
                    }
                }
                DecoratorLifecycle::Unmount => {
                    decorator_cache.remove(key);
                }
            }
        }
    }

    let drifted: Vec<NodeKey> = decorator_cache
        .keys()
        .filter(|&key| range_cache.get(key).map(|entry| entry.location) != decorator_cache.location_of(key))
        .collect();
    for key in drifted {
        if let Some(entry) = range_cache.get(key) {
            decorator_cache.set(key, entry.location);
        }
    }
}

/// §6.3: applies paragraph-level style to every unique block target the
/// plan names, in its own edit session (block-style attributes are set
/// after the structural/text edits have already landed and the range cache
/// reflects final locations).
fn apply_block_styles(
    buffer: &mut AttributedBuffer,
    range_cache: &RangeCache,
    pending_state: &EditorState,
    plan: &DiffPlan,
) -> Result<(), ReconcileError> {
    if plan.block_level_targets.is_empty() {
        return Ok(());
    }

    let mut seen = std::collections::HashSet::new();
    let mut targets = Vec::new();
    for &key in &plan.block_level_targets {
        if seen.insert(key) {
            targets.push(key);
        }
    }

    buffer.begin_edit()?;
    for key in targets {
        let Some(block_attrs) = pending_state.block_level_attributes(key) else {
            continue;
        };
        let Some(entry) = range_cache.get(key) else { continue };
        reconciler_buffer::apply_block_level_attributes(buffer, block_attrs, entry.entire_range())?;
    }
    buffer.end_edit()?;
    Ok(())
}
