// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#![allow(dead_code)]

use reconciler_core::node_tree::{EditorState, NodeKey, NodeRecord, TextFormat};
use reconciler_core::range_cache::{RangeCache, RangeCacheEntry};

/// Builds an `EditorState` with `paragraphs` top-level paragraphs, each
/// containing one text run of `paragraph_text`, plus the `RangeCache` that
/// would result from hydrating it.
pub fn document_of(paragraphs: usize, paragraph_text: &str) -> (EditorState, RangeCache) {
    let mut state = EditorState::empty();
    let mut root = state.node_map.get(&NodeKey::ROOT).unwrap().clone();
    let mut cache = RangeCache::new();
    let mut order = Vec::with_capacity(paragraphs * 2 + 1);
    order.push(NodeKey::ROOT);

    let mut location: u32 = 0;
    let stride = paragraph_text.len() as u32 + 1; // +1 for the line break
    for i in 0..paragraphs {
        let paragraph_key = NodeKey((2 * i as u64) + 1);
        let run_key = NodeKey((2 * i as u64) + 2);

        root.children.push(paragraph_key);

        let mut paragraph = NodeRecord::element(paragraph_key, NodeKey::ROOT, false);
        paragraph.children = vec![run_key];
        state.node_map.insert(paragraph_key, paragraph);
        state
            .node_map
            .insert(run_key, NodeRecord::text(run_key, paragraph_key, paragraph_text, TextFormat::default()));

        cache.insert(
            paragraph_key,
            RangeCacheEntry {
                location,
                children_len: paragraph_text.len() as u32,
                postamble_len: if i + 1 < paragraphs { 1 } else { 0 },
                ..Default::default()
            },
        );
        cache.insert(
            run_key,
            RangeCacheEntry {
                location,
                text_len: paragraph_text.len() as u32,
                ..Default::default()
            },
        );
        order.push(paragraph_key);
        order.push(run_key);
        location += stride;
    }

    cache.insert(
        NodeKey::ROOT,
        RangeCacheEntry {
            children_len: location.saturating_sub(1),
            ..Default::default()
        },
    );
    state.node_map.insert(NodeKey::ROOT, root);
    cache.order.rebuild(order);

    (state, cache)
}

pub fn buffer_text_of(paragraphs: usize, paragraph_text: &str) -> String {
    vec![paragraph_text; paragraphs].join("\n")
}
