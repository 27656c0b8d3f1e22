//! Shared subtree renderer: walks a node and its descendants in document
//! order, producing both the attributed text for the subtree and the
//! range-cache entries for every node visited. This is the single source of
//! truth the slow path (full rebuild) and every fast path's "render the
//! newly created part" step both call into, so a fast path's output is
//! always byte-for-byte what a full rebuild would have produced there
//! (§8.2 shadow-compare).

use std::collections::BTreeMap;

use reconciler_buffer::{AttachmentMetadata, AttributeMap, AttributedString};

use crate::node_tree::{EditorState, NodeKey, NodeKind, NodeTree};
use crate::range_cache::RangeCacheEntry;

pub struct RenderedSubtree {
    pub attributed: AttributedString,
    /// Range-cache entries for `key` and every descendant, with `location`
    /// relative to the start of the rendered text (0-based).
    pub entries: Vec<(NodeKey, RangeCacheEntry)>,
    /// Decorator keys encountered, in document order.
    pub decorator_keys: Vec<NodeKey>,
}

pub fn render_subtree(state: &EditorState, key: NodeKey) -> RenderedSubtree {
    let mut text = String::new();
    let mut spans: Vec<(std::ops::Range<usize>, AttributeMap)> = Vec::new();
    let mut attachments: BTreeMap<usize, AttachmentMetadata> = BTreeMap::new();
    let mut entries = Vec::new();
    let mut decorator_keys = Vec::new();

    render_node(
        state,
        key,
        &mut text,
        &mut spans,
        &mut attachments,
        &mut entries,
        &mut decorator_keys,
    );

    RenderedSubtree {
        attributed: AttributedString {
            text,
            spans,
            attachments,
        },
        entries,
        decorator_keys,
    }
}

fn render_node(
    state: &EditorState,
    key: NodeKey,
    text: &mut String,
    spans: &mut Vec<(std::ops::Range<usize>, AttributeMap)>,
    attachments: &mut BTreeMap<usize, AttachmentMetadata>,
    entries: &mut Vec<(NodeKey, RangeCacheEntry)>,
    decorator_keys: &mut Vec<NodeKey>,
) -> RangeCacheEntry {
    let location = text.len() as u32;

    let preamble = state.preamble(key);
    text.push_str(&preamble);
    let preamble_len = preamble.len() as u32;

    let kind = state.kind(key).unwrap_or(NodeKind::Root);
    let mut children_len = 0u32;
    let mut text_len = 0u32;

    match kind {
        NodeKind::Element { .. } | NodeKind::Root => {
            for child in state.children(key) {
                let child_entry =
                    render_node(state, child, text, spans, attachments, entries, decorator_keys);
                children_len += child_entry.entire_len();
            }
        }
        NodeKind::Text => {
            let node_text = state.text(key);
            let start = text.len();
            text.push_str(&node_text);
            text_len = node_text.len() as u32;
            let attrs = state.attributed_attributes(key);
            if !attrs.is_empty() {
                spans.push((start..start + node_text.len(), attrs));
            }
        }
        NodeKind::Decorator => {
            let start = text.len();
            text.push('\u{FFFC}');
            text_len = '\u{FFFC}'.len_utf8() as u32;
            attachments.insert(
                start,
                AttachmentMetadata {
                    tag: format!("{key:?}"),
                },
            );
            decorator_keys.push(key);
        }
        NodeKind::LineBreak => {
            text.push('\n');
            text_len = 1;
        }
    }

    let postamble = state.postamble(key);
    text.push_str(&postamble);
    let postamble_len = postamble.len() as u32;

    let entry = RangeCacheEntry {
        location,
        preamble_len,
        children_len,
        text_len,
        postamble_len,
        preamble_special_len: 0,
    };
    entries.push((key, entry));
    entry
}
