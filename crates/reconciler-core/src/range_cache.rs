//! C3 — per-node absolute location and component lengths (§3.1), plus the
//! §8.1 universal invariant sweep.

use std::collections::BTreeMap;

use crate::decorators::DecoratorPositionCache;
use crate::document_order::DocumentOrder;
use crate::error::ReconcileError;
use crate::fenwick::{FenwickTree, LocationShift};
use crate::node_tree::{EditorState, NodeKey, NodeKind, NodeTree};

/// One range cache record per live node key (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeCacheEntry {
    pub location: u32,
    pub preamble_len: u32,
    pub children_len: u32,
    pub text_len: u32,
    pub postamble_len: u32,
    pub preamble_special_len: u32,
}

impl RangeCacheEntry {
    pub fn entire_len(&self) -> u32 {
        self.preamble_len + self.children_len + self.text_len + self.postamble_len
    }

    pub fn entire_range(&self) -> std::ops::Range<usize> {
        self.location as usize..(self.location + self.entire_len()) as usize
    }
}

/// Which component length a §4.3 `apply_length_delta` call targets.
/// `Children` is included so the ancestor-propagation pass (growing a
/// parent's `children_len` when a descendant grows) can be expressed with
/// the same helper rather than a separate code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPart {
    Preamble,
    Children,
    Text,
    Postamble,
}

impl LengthPart {
    fn apply(self, entry: &mut RangeCacheEntry, delta: i64) {
        let field = match self {
            LengthPart::Preamble => &mut entry.preamble_len,
            LengthPart::Children => &mut entry.children_len,
            LengthPart::Text => &mut entry.text_len,
            LengthPart::Postamble => &mut entry.postamble_len,
        };
        *field = (*field as i64 + delta).max(0) as u32;
    }
}

/// Map `NodeKey -> RangeCacheEntry`, the document-order vector over live
/// keys, and the decorator position cache mirror (§3.1).
#[derive(Debug, Clone, Default)]
pub struct RangeCache {
    entries: BTreeMap<NodeKey, RangeCacheEntry>,
    pub order: DocumentOrder,
}

impl RangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: NodeKey) -> Option<&RangeCacheEntry> {
        self.entries.get(&key)
    }

    pub fn insert(&mut self, key: NodeKey, entry: RangeCacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: NodeKey) -> Option<RangeCacheEntry> {
        self.entries.remove(&key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shifts every entry's `location` at or after `from` by `delta`.
    /// Called by the applier after the Fenwick/diff-array index has
    /// accumulated an update's location deltas.
    pub fn shift_locations_from(&mut self, from: u32, delta: i64) {
        for entry in self.entries.values_mut() {
            if entry.location >= from {
                entry.location = (entry.location as i64 + delta).max(0) as u32;
            }
        }
    }

    /// §4.3 `apply_length_delta`: updates one part length on `key`'s own
    /// entry, then walks the ancestor chain (via `tree`) adding `delta` to
    /// each ancestor's `children_len`. Returns the accumulated delta so
    /// callers building a central-aggregation batch can fold it into a
    /// `{start_key -> total_delta}` map without re-deriving it.
    pub fn apply_length_delta(
        &mut self,
        tree: &dyn NodeTree,
        key: NodeKey,
        part: LengthPart,
        delta: i64,
    ) -> i64 {
        if delta == 0 {
            return 0;
        }
        if let Some(entry) = self.entries.get_mut(&key) {
            part.apply(entry, delta);
        }
        let mut current = tree.parent(key);
        while let Some(ancestor) = current {
            if let Some(entry) = self.entries.get_mut(&ancestor) {
                entry.children_len = (entry.children_len as i64 + delta).max(0) as u32;
            }
            current = tree.parent(ancestor);
        }
        delta
    }

    /// §4.3 `apply_length_deltas_batch`: applies every `(key, part, delta)`
    /// triple via [`Self::apply_length_delta`] and folds the per-node deltas
    /// into a `{key -> total_delta}` map, collapsing multiple changes to the
    /// same node (e.g. a preamble shrink plus a text grow) into one entry
    /// before a single `range_add` finalizes locations (§4.8).
    pub fn apply_length_deltas_batch(
        &mut self,
        tree: &dyn NodeTree,
        changes: &[(NodeKey, LengthPart, i64)],
    ) -> BTreeMap<NodeKey, i64> {
        let mut totals: BTreeMap<NodeKey, i64> = BTreeMap::new();
        for &(key, part, delta) in changes {
            self.apply_length_delta(tree, key, part, delta);
            *totals.entry(key).or_insert(0) += delta;
        }
        totals
    }

    /// §4.1 `rebuild_locations_with_ranges` / §4.3
    /// `apply_incremental_location_shifts`: given `{start_key -> delta}`
    /// entries, shifts the `location` of every node at or after
    /// `start_key`'s document-order index by `delta`, via a difference-array
    /// pass over `order`. The dirty node itself is never shifted (§4.1
    /// exclusive-start semantics): only indices strictly after it move.
    /// Final locations are clamped to `>= 0`.
    pub fn apply_incremental_location_shifts(&mut self, shifts: &BTreeMap<NodeKey, i64>) {
        if shifts.is_empty() || self.order.is_empty() {
            return;
        }
        let mut diffs = vec![0i64; self.order.len() + 1];
        for (&key, &delta) in shifts {
            let Some(index) = self.order.index_of(key) else {
                continue;
            };
            diffs[index + 1] += delta;
        }

        let mut running = 0i64;
        for index in 0..self.order.len() {
            running += diffs[index];
            if running == 0 {
                continue;
            }
            let Some(key) = self.order.key_at(index) else {
                continue;
            };
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.location = (entry.location as i64 + running).max(0) as u32;
            }
        }
    }

    /// §9's `use_fenwick_delta` alternative to
    /// [`Self::apply_incremental_location_shifts`]: same exclusive-start
    /// suffix-shift semantics, accumulated through a [`FenwickTree`] instead
    /// of a difference array.
    pub fn apply_location_shifts_via_fenwick(&mut self, shifts: &BTreeMap<NodeKey, i64>) {
        if shifts.is_empty() || self.order.is_empty() {
            return;
        }
        let mut fenwick = FenwickTree::new(self.order.len());
        for (&key, &delta) in shifts {
            let Some(index) = self.order.index_of(key) else {
                continue;
            };
            fenwick.add_suffix(index + 1, delta);
        }

        for index in 0..self.order.len() {
            let delta = fenwick.prefix(index);
            if delta == 0 {
                continue;
            }
            let Some(key) = self.order.key_at(index) else {
                continue;
            };
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.location = (entry.location as i64 + delta).max(0) as u32;
            }
        }
    }

    /// §4.3 `prune_globally`: drops every cache entry whose key no longer
    /// exists in `pending_state`, then rebuilds the document-order vector
    /// over the surviving keys in their existing relative order.
    pub fn prune_globally(&mut self, pending_state: &EditorState) -> usize {
        let stale: Vec<NodeKey> = self
            .entries
            .keys()
            .copied()
            .filter(|key| pending_state.get(*key).is_none())
            .collect();
        let removed = stale.len();
        for key in stale {
            self.entries.remove(&key);
        }
        let surviving: Vec<NodeKey> = self
            .order
            .iter()
            .filter(|key| self.entries.contains_key(key))
            .collect();
        self.order.rebuild(surviving);
        removed
    }

    /// §4.3 `prune_under_ancestor`: drops cache entries for keys that were
    /// under `ancestor` in `prev_state` but no longer exist under it (or at
    /// all) in `pending_state` — the narrower sibling of
    /// [`Self::prune_globally`] used by the delete-block and
    /// contiguous-replace fast paths, which only touch one subtree.
    pub fn prune_under_ancestor(
        &mut self,
        ancestor: NodeKey,
        prev_state: &EditorState,
        pending_state: &EditorState,
    ) -> usize {
        let mut stack = vec![ancestor];
        let mut removed = Vec::new();
        while let Some(key) = stack.pop() {
            if pending_state.get(key).is_none() {
                removed.push(key);
            }
            if let Some(record) = prev_state.get(key) {
                stack.extend(record.children.iter().copied());
            }
        }
        let count = removed.len();
        for key in removed {
            self.entries.remove(&key);
        }
        let surviving: Vec<NodeKey> = self
            .order
            .iter()
            .filter(|key| self.entries.contains_key(key))
            .collect();
        self.order.rebuild(surviving);
        count
    }

    /// Inserts every `(key, entry)` pair, absolute locations already baked
    /// in by the caller. Used by fast paths to splice a newly rendered
    /// subtree's entries into the cache in one step.
    pub fn splice_subtree(&mut self, entries: &[(NodeKey, RangeCacheEntry)]) {
        for &(key, entry) in entries {
            self.entries.insert(key, entry);
        }
    }

    /// Rebuilds the document-order vector from scratch by sorting every
    /// live entry by `(location asc, entire_len desc)` (§8.1 invariant 5).
    /// O(n log n); used after structural changes in place of precise
    /// splice-index bookkeeping.
    pub fn rebuild_document_order(&mut self) {
        let mut ordered: Vec<NodeKey> = self.entries.keys().copied().collect();
        ordered.sort_by(|a, b| {
            let ea = &self.entries[a];
            let eb = &self.entries[b];
            ea.location
                .cmp(&eb.location)
                .then_with(|| eb.entire_len().cmp(&ea.entire_len()))
        });
        self.order.rebuild(ordered);
    }

    /// §8.1: the universal invariant sweep, run after every update when
    /// `reconciler_sanity_check` is enabled. Returns the first violation
    /// found rather than panicking, per §7's non-panicking policy.
    pub fn verify_invariants(
        &self,
        state: &EditorState,
        buffer_len: u32,
        decorator_cache: &DecoratorPositionCache,
    ) -> Result<(), ReconcileError> {
        // 1. Root entire-length equals buffer length.
        if let Some(root) = self.get(NodeKey::ROOT) {
            if root.entire_len() != buffer_len {
                return Err(ReconcileError::InvariantViolation {
                    key: NodeKey::ROOT,
                    invariant: "root-entire-length-equals-buffer-length",
                    detail: format!(
                        "root entire_len {} != buffer len {}",
                        root.entire_len(),
                        buffer_len
                    ),
                });
            }
        }

        for (&key, entry) in &self.entries {
            // 2. Parts sum to entire length; all non-negative (u32 already
            // guarantees non-negative; this checks overflow-free summation).
            let sum = (entry.preamble_len as u64)
                + (entry.children_len as u64)
                + (entry.text_len as u64)
                + (entry.postamble_len as u64);
            if sum != entry.entire_len() as u64 {
                return Err(ReconcileError::InvariantViolation {
                    key,
                    invariant: "parts-sum-to-entire-length",
                    detail: format!("sum {sum} != entire_len {}", entry.entire_len()),
                });
            }

            // 3. preamble_special_len <= preamble_len.
            if entry.preamble_special_len > entry.preamble_len {
                return Err(ReconcileError::InvariantViolation {
                    key,
                    invariant: "preamble-special-len-bounded",
                    detail: format!(
                        "preamble_special_len {} > preamble_len {}",
                        entry.preamble_special_len, entry.preamble_len
                    ),
                });
            }

            // 7. No stale keys: every cached key exists in pending state.
            if state.get(key).is_none() {
                return Err(ReconcileError::StaleState { key });
            }
        }

        // 4. Children locations are contiguous and in order within their
        // parent.
        for (&key, entry) in &self.entries {
            if let Some(NodeKind::Element { .. }) = state.kind(key) {
                let children_start = entry.location + entry.preamble_len;
                let mut cursor = children_start;
                for &child_key in state.children_of(key) {
                    let Some(child_entry) = self.get(child_key) else {
                        continue;
                    };
                    if child_entry.location != cursor {
                        return Err(ReconcileError::InvariantViolation {
                            key: child_key,
                            invariant: "children-contiguous-and-ordered",
                            detail: format!(
                                "expected location {cursor}, found {}",
                                child_entry.location
                            ),
                        });
                    }
                    cursor += child_entry.entire_len();
                }
            }
        }

        // 5. Document-order vector sorted by (location asc, entire_len desc).
        let mut prev: Option<(u32, u32)> = None;
        for key in self.order.iter() {
            let Some(entry) = self.get(key) else { continue };
            let current = (entry.location, entry.entire_len());
            if let Some((prev_loc, prev_len)) = prev {
                let ordered = current.0 > prev_loc || (current.0 == prev_loc && current.1 <= prev_len);
                if !ordered {
                    return Err(ReconcileError::InvariantViolation {
                        key,
                        invariant: "document-order-sorted",
                        detail: format!("entry {current:?} out of order after {:?}", (prev_loc, prev_len)),
                    });
                }
            }
            prev = Some(current);
        }

        // 6. Decorator position cache mirrors the range cache's locations
        // at every live decorator key.
        let decorator_keys: Vec<NodeKey> = self
            .entries
            .keys()
            .copied()
            .filter(|&key| matches!(state.kind(key), Some(NodeKind::Decorator)))
            .collect();
        if !decorator_cache.matches_range_cache(self, &decorator_keys) {
            return Err(ReconcileError::InvariantViolation {
                key: NodeKey::ROOT,
                invariant: "decorator-cache-matches-range-cache",
                detail: "decorator position cache out of sync with range cache".to_string(),
            });
        }

        Ok(())
    }
}
