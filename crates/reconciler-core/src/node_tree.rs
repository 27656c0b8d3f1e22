//! §3.1 data model entities and the §6.1 node-tree interface.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use reconciler_buffer::AttributeMap;

/// Opaque stable identifier for a node within a state. Unique per state, but
/// may be shared across `prev_state`/`pending_state` when a node survives an
/// update unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(pub u64);

static NEXT_NODE_KEY: AtomicU64 = AtomicU64::new(1);

impl NodeKey {
    /// The distinguished root key every document tree is rooted at.
    pub const ROOT: NodeKey = NodeKey(0);

    /// Allocates a fresh, process-unique key. Callers that need
    /// deterministic keys (tests, replay) should construct `NodeKey`
    /// directly instead.
    pub fn fresh() -> Self {
        NodeKey(NEXT_NODE_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-character style bits a `Text` node's run carries (§3.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub subscript: bool,
    pub superscript: bool,
}

/// Discriminates a node's role and render shape (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element { inline: bool },
    Text,
    Decorator,
    LineBreak,
}

impl NodeKind {
    pub fn is_leaf(&self) -> bool {
        !matches!(self, NodeKind::Root | NodeKind::Element { .. })
    }
}

/// Paragraph-level spacing/indent a node contributes to the block-style pass
/// (§6.3), re-exported from `reconciler-buffer` so node implementations
/// don't need a direct dependency on that crate.
pub type BlockLevelAttributes = reconciler_buffer::BlockLevelAttributes;

/// A node as it exists within one `EditorState`. Pure value record: no
/// pointers, no back-references to an owning editor (§9 design note on
/// cyclic node/editor ownership).
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub key: NodeKey,
    pub kind: NodeKind,
    pub parent_key: Option<NodeKey>,
    /// Element-only: ordered child keys.
    pub children: Vec<NodeKey>,
    /// Text-only: the run's text and format mask.
    pub text_part: String,
    pub format: TextFormat,
}

impl NodeRecord {
    pub fn root() -> Self {
        NodeRecord {
            key: NodeKey::ROOT,
            kind: NodeKind::Root,
            parent_key: None,
            children: Vec::new(),
            text_part: String::new(),
            format: TextFormat::default(),
        }
    }

    pub fn element(key: NodeKey, parent_key: NodeKey, inline: bool) -> Self {
        NodeRecord {
            key,
            kind: NodeKind::Element { inline },
            parent_key: Some(parent_key),
            children: Vec::new(),
            text_part: String::new(),
            format: TextFormat::default(),
        }
    }

    pub fn text(key: NodeKey, parent_key: NodeKey, text: impl Into<String>, format: TextFormat) -> Self {
        NodeRecord {
            key,
            kind: NodeKind::Text,
            parent_key: Some(parent_key),
            children: Vec::new(),
            text_part: text.into(),
            format,
        }
    }

    pub fn decorator(key: NodeKey, parent_key: NodeKey) -> Self {
        NodeRecord {
            key,
            kind: NodeKind::Decorator,
            parent_key: Some(parent_key),
            children: Vec::new(),
            text_part: String::new(),
            format: TextFormat::default(),
        }
    }

    pub fn line_break(key: NodeKey, parent_key: NodeKey) -> Self {
        NodeRecord {
            key,
            kind: NodeKind::LineBreak,
            parent_key: Some(parent_key),
            children: Vec::new(),
            text_part: String::new(),
            format: TextFormat::default(),
        }
    }

    pub fn is_inline(&self) -> bool {
        match self.kind {
            NodeKind::Element { inline } => inline,
            NodeKind::Text | NodeKind::Decorator | NodeKind::LineBreak => true,
            NodeKind::Root => false,
        }
    }

    pub fn can_be_empty(&self) -> bool {
        !matches!(self.kind, NodeKind::Text)
    }

    pub fn exclude_from_copy(&self) -> bool {
        matches!(self.kind, NodeKind::Decorator)
    }

    /// §6.1 `preamble()`. Leaf kinds other than text carry no preamble of
    /// their own in this model; element preambles (list markers, quote
    /// prefixes) are supplied by `children_preamble`/custom fields on the
    /// owning element through the tree's `preamble_for` hook, since the
    /// plain value record here has no room for per-kind custom payloads.
    pub fn preamble(&self) -> &str {
        ""
    }

    /// §6.1 `postamble()`.
    pub fn postamble(&self) -> &str {
        ""
    }

    pub fn text(&self) -> &str {
        &self.text_part
    }

    pub fn format(&self) -> TextFormat {
        self.format
    }
}

/// Immutable logical snapshot of the whole document (§3.1). `prev_state` is
/// what the buffer currently reflects; `pending_state` is what the next
/// reconcile must produce.
#[derive(Debug, Clone)]
pub struct EditorState {
    pub node_map: BTreeMap<NodeKey, NodeRecord>,
    pub selection: Option<crate::selection::Point>,
    pub version: u64,
}

impl EditorState {
    pub fn empty() -> Self {
        let mut node_map = BTreeMap::new();
        node_map.insert(NodeKey::ROOT, NodeRecord::root());
        EditorState {
            node_map,
            selection: None,
            version: 0,
        }
    }

    pub fn get(&self, key: NodeKey) -> Option<&NodeRecord> {
        self.node_map.get(&key)
    }

    pub fn children_of(&self, key: NodeKey) -> &[NodeKey] {
        self.node_map
            .get(&key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }
}

/// §6.1: the read-only interface the reconciler consumes during a reconcile
/// cycle. `EditorState` implements it directly; the reconciler treats the
/// trait object as opaque and never mutates through it.
pub trait NodeTree {
    fn kind(&self, key: NodeKey) -> Option<NodeKind>;
    fn preamble(&self, key: NodeKey) -> String;
    fn postamble(&self, key: NodeKey) -> String;
    fn text(&self, key: NodeKey) -> String;
    fn format(&self, key: NodeKey) -> TextFormat;
    fn is_inline(&self, key: NodeKey) -> bool;
    fn attributed_attributes(&self, key: NodeKey) -> AttributeMap;
    fn block_level_attributes(&self, key: NodeKey) -> Option<BlockLevelAttributes>;
    fn children(&self, key: NodeKey) -> Vec<NodeKey>;
    fn parent(&self, key: NodeKey) -> Option<NodeKey>;
}

impl NodeTree for EditorState {
    fn kind(&self, key: NodeKey) -> Option<NodeKind> {
        self.get(key).map(|n| n.kind)
    }

    fn preamble(&self, key: NodeKey) -> String {
        self.get(key).map(|n| n.preamble().to_string()).unwrap_or_default()
    }

    fn postamble(&self, key: NodeKey) -> String {
        self.get(key).map(|n| n.postamble().to_string()).unwrap_or_default()
    }

    fn text(&self, key: NodeKey) -> String {
        self.get(key).map(|n| n.text().to_string()).unwrap_or_default()
    }

    fn format(&self, key: NodeKey) -> TextFormat {
        self.get(key).map(|n| n.format()).unwrap_or_default()
    }

    fn is_inline(&self, key: NodeKey) -> bool {
        self.get(key).map(|n| n.is_inline()).unwrap_or(false)
    }

    fn attributed_attributes(&self, _key: NodeKey) -> AttributeMap {
        AttributeMap::new()
    }

    fn block_level_attributes(&self, _key: NodeKey) -> Option<BlockLevelAttributes> {
        None
    }

    fn children(&self, key: NodeKey) -> Vec<NodeKey> {
        self.children_of(key).to_vec()
    }

    fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.get(key).and_then(|n| n.parent_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_has_only_root() {
        let state = EditorState::empty();
        assert_eq!(state.node_map.len(), 1);
        assert!(state.get(NodeKey::ROOT).is_some());
    }

    #[test]
    fn fresh_keys_are_unique() {
        let a = NodeKey::fresh();
        let b = NodeKey::fresh();
        assert_ne!(a, b);
    }
}
