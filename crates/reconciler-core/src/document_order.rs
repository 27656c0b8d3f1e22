//! C2 — document order and key→index lookup over the live range cache.

use std::collections::HashMap;

use crate::node_tree::NodeKey;

/// DFS/location-ordered sequence of every live node key, with an O(1)
/// reverse lookup from key to its position. §8.1 invariant 5 requires this
/// vector stay sorted by `(location asc, entire_len desc)`; this type only
/// stores the order — callers are responsible for keeping it consistent
/// with the range cache it indexes.
#[derive(Debug, Clone, Default)]
pub struct DocumentOrder {
    ordered_keys: Vec<NodeKey>,
    index_of: HashMap<NodeKey, usize>,
}

impl DocumentOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild<I: IntoIterator<Item = NodeKey>>(&mut self, ordered: I) {
        self.ordered_keys = ordered.into_iter().collect();
        self.index_of.clear();
        for (i, key) in self.ordered_keys.iter().enumerate() {
            self.index_of.insert(*key, i);
        }
    }

    pub fn index_of(&self, key: NodeKey) -> Option<usize> {
        self.index_of.get(&key).copied()
    }

    pub fn key_at(&self, index: usize) -> Option<NodeKey> {
        self.ordered_keys.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.ordered_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.ordered_keys.iter().copied()
    }

    /// Inserts `key` at `index`, shifting every key at or after `index` up
    /// by one. Currently unused: every classifier that changes the live key
    /// set goes through `resort_document_order` → `rebuild_document_order`
    /// instead of a precise splice (see DESIGN.md's note on that
    /// simplification). Reserved for a future fast path that knows the exact
    /// document-order slot of a newly created subtree without rebuilding.
    pub fn insert_at(&mut self, index: usize, key: NodeKey) {
        self.ordered_keys.insert(index, key);
        self.reindex_from(index);
    }

    /// Removes the key at `index`, shifting every following key down by one.
    /// Currently unused for the same reason as [`Self::insert_at`].
    pub fn remove_at(&mut self, index: usize) -> Option<NodeKey> {
        if index >= self.ordered_keys.len() {
            return None;
        }
        let removed = self.ordered_keys.remove(index);
        self.index_of.remove(&removed);
        self.reindex_from(index);
        Some(removed)
    }

    fn reindex_from(&mut self, from: usize) {
        for (i, key) in self.ordered_keys.iter().enumerate().skip(from) {
            self.index_of.insert(*key, i);
        }
    }
}
