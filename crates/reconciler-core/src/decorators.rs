//! Decorator lifecycle (create/mount, decorate, unmount) and the
//! `DecoratorPositionCache` (§3.1) that mirrors decorator-node locations
//! for fast view positioning.

use std::collections::BTreeMap;

use crate::node_tree::NodeKey;
use crate::range_cache::RangeCache;

/// Lifecycle transition a decorator node goes through across an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorLifecycle {
    /// Newly present in `pending_state`: create and mount its view.
    Mount,
    /// Present in both states with no relevant change: re-decorate in
    /// place (e.g. theme or attribute refresh) without remounting.
    Decorate,
    /// Present in `prev_state` but absent from `pending_state`: unmount.
    Unmount,
}

/// Mirrors the range cache's decorator-key subset as `NodeKey -> location`
/// (§3.1, §8.1 invariant 6).
#[derive(Debug, Clone, Default)]
pub struct DecoratorPositionCache {
    positions: BTreeMap<NodeKey, u32>,
}

impl DecoratorPositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location_of(&self, key: NodeKey) -> Option<u32> {
        self.positions.get(&key).copied()
    }

    pub fn set(&mut self, key: NodeKey, location: u32) {
        self.positions.insert(key, location);
    }

    pub fn remove(&mut self, key: NodeKey) {
        self.positions.remove(&key);
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.positions.keys().copied()
    }

    /// §8.1 invariant 6: this cache must equal the subset of range-cache
    /// locations at decorator keys. Rebuilds from the range cache given the
    /// live decorator key set, rather than trying to patch incrementally —
    /// the set of decorators touched by an update is typically small.
    pub fn sync_from_range_cache(&mut self, range_cache: &RangeCache, decorator_keys: &[NodeKey]) {
        self.positions.clear();
        for &key in decorator_keys {
            if let Some(entry) = range_cache.get(key) {
                self.positions.insert(key, entry.location);
            }
        }
    }

    pub fn matches_range_cache(&self, range_cache: &RangeCache, decorator_keys: &[NodeKey]) -> bool {
        if self.positions.len() != decorator_keys.len() {
            return false;
        }
        decorator_keys.iter().all(|key| {
            range_cache
                .get(*key)
                .map(|entry| self.positions.get(key) == Some(&entry.location))
                .unwrap_or(false)
        })
    }
}

/// Computes lifecycle transitions for every decorator key seen in either
/// state, used by the applier's decorator-reconciliation step after buffer
/// edits land.
pub fn lifecycle_transitions(
    prev_decorator_keys: &[NodeKey],
    pending_decorator_keys: &[NodeKey],
) -> Vec<(NodeKey, DecoratorLifecycle)> {
    let prev: std::collections::BTreeSet<_> = prev_decorator_keys.iter().copied().collect();
    let pending: std::collections::BTreeSet<_> = pending_decorator_keys.iter().copied().collect();

    let mut transitions = Vec::new();
    for &key in &pending {
        if prev.contains(&key) {
            transitions.push((key, DecoratorLifecycle::Decorate));
        } else {
            transitions.push((key, DecoratorLifecycle::Mount));
        }
    }
    for &key in &prev {
        if !pending.contains(&key) {
            transitions.push((key, DecoratorLifecycle::Unmount));
        }
    }
    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range_cache::RangeCacheEntry;

    #[test]
    fn transitions_cover_mount_decorate_and_unmount() {
        let a = NodeKey(1);
        let b = NodeKey(2);
        let c = NodeKey(3);

        let transitions = lifecycle_transitions(&[a, b], &[b, c]);

        assert!(transitions.contains(&(b, DecoratorLifecycle::Decorate)));
        assert!(transitions.contains(&(c, DecoratorLifecycle::Mount)));
        assert!(transitions.contains(&(a, DecoratorLifecycle::Unmount)));
    }

    #[test]
    fn position_cache_syncs_from_range_cache() {
        let mut range_cache = RangeCache::new();
        let key = NodeKey(5);
        range_cache.insert(
            key,
            RangeCacheEntry {
                location: 42,
                ..Default::default()
            },
        );

        let mut positions = DecoratorPositionCache::new();
        positions.sync_from_range_cache(&range_cache, &[key]);

        assert_eq!(positions.location_of(key), Some(42));
        assert!(positions.matches_range_cache(&range_cache, &[key]));
    }
}
