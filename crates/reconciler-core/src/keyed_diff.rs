//! C5 — LIS-based minimal-move planner for keyed sibling reorders. Falls
//! back to region rebuild above a configurable density threshold (§9 open
//! question: default 10%).

use crate::node_tree::NodeKey;

/// Default stability threshold (§9): above this fraction of children
/// needing to move, a region rebuild is cheaper than emitting individual
/// moves.
pub const DEFAULT_STABILITY_THRESHOLD_PCT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyedDiffPlan {
    /// Indices (into the pending child order) that stay in place, and the
    /// indices that must move.
    Moves {
        stable_indices: Vec<usize>,
        moved_indices: Vec<usize>,
    },
    /// Too many children moved relative to `threshold_pct`; caller should
    /// use the region-rebuild planner branch instead.
    RebuildRegion,
}

/// Computes the Longest Increasing Subsequence of `prev_positions` (each
/// pending child's index in the previous order, or `None` if newly
/// inserted) via patience sort, in O(n log n). Returns indices into
/// `prev_positions` that form the LIS — these are exactly the children
/// that can remain untouched during the reorder.
pub fn longest_increasing_subsequence(prev_positions: &[Option<usize>]) -> Vec<usize> {
    // Patience sort over the defined (non-None) values; None entries (new
    // children) are never part of the LIS since they have no previous
    // position to stay consistent with.
    let mut piles_tops: Vec<usize> = Vec::new(); // index into prev_positions of each pile's top
    let mut predecessors: Vec<Option<usize>> = vec![None; prev_positions.len()];

    for (i, maybe_pos) in prev_positions.iter().enumerate() {
        let Some(pos) = maybe_pos else { continue };
        let value = *pos;

        // Binary search for the first pile whose top value >= value.
        let mut lo = 0usize;
        let mut hi = piles_tops.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let top_value = prev_positions[piles_tops[mid]].unwrap();
            if top_value < value {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if lo > 0 {
            predecessors[i] = Some(piles_tops[lo - 1]);
        }
        if lo == piles_tops.len() {
            piles_tops.push(i);
        } else {
            piles_tops[lo] = i;
        }
    }

    let mut lis = Vec::with_capacity(piles_tops.len());
    let mut cursor = piles_tops.last().copied();
    while let Some(i) = cursor {
        lis.push(i);
        cursor = predecessors[i];
    }
    lis.reverse();
    lis
}

/// Classifies a keyed reorder: `pending_order` and `prev_order` list sibling
/// keys in each state's order. Children present in `pending_order` but not
/// `prev_order` are treated as insertions (never part of the LIS); children
/// present in `prev_order` but not `pending_order` are deletions and are
/// not represented in the plan at all (the caller emits their deletes
/// separately).
pub fn plan_keyed_reorder(
    prev_order: &[NodeKey],
    pending_order: &[NodeKey],
    threshold_pct: u32,
) -> KeyedDiffPlan {
    let prev_index: std::collections::HashMap<NodeKey, usize> = prev_order
        .iter()
        .enumerate()
        .map(|(i, k)| (*k, i))
        .collect();

    let prev_positions: Vec<Option<usize>> = pending_order
        .iter()
        .map(|k| prev_index.get(k).copied())
        .collect();

    let lis = longest_increasing_subsequence(&prev_positions);
    let stable: std::collections::HashSet<usize> = lis.iter().copied().collect();

    let moved_indices: Vec<usize> = (0..pending_order.len())
        .filter(|i| !stable.contains(i))
        .collect();

    if !pending_order.is_empty() {
        let moved_pct = (moved_indices.len() as u64 * 100) / pending_order.len() as u64;
        if moved_pct > threshold_pct as u64 {
            return KeyedDiffPlan::RebuildRegion;
        }
    }

    KeyedDiffPlan::Moves {
        stable_indices: lis,
        moved_indices,
    }
}
