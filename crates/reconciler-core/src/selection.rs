//! C7 (selection half) — logical selection points mapped to and from
//! absolute buffer locations.

use crate::error::ReconcileError;
use crate::node_tree::{EditorState, NodeKey, NodeKind, NodeTree};
use crate::range_cache::RangeCache;

/// Which side of an offset a caret logically belongs to, used to
/// disambiguate locations that sit exactly at a node boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Forward,
    Backward,
}

/// §4.7: whether a `Point`'s `offset` is a byte offset into a `Text` node's
/// own text part, or a child index into an `Element`'s children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Text,
    Element,
}

/// A logical caret position: a node key plus an offset — a text-byte offset
/// when `side == Text`, a child index when `side == Element` — with a side
/// affinity for boundary disambiguation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    pub side: Side,
    pub affinity: Affinity,
}

/// A logical selection: either a caret (`anchor == focus`) or a range
/// between two points, tracked the way the spec's `RangeSelection`/
/// `NodeSelection` distinguish text-range selections from whole-node
/// selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Range { anchor: Point, focus: Point },
    Node(NodeKey),
}

/// Maps a logical point to its absolute buffer location via the range
/// cache (§4.7):
///
/// - `Side::Text`: `location + preamble_len + min(offset, text_len)` —
///   the offset clamps to the node's own text length.
/// - `Side::Element`: `location + preamble_len + Σ entire_len(children[0..offset])`.
pub fn location_of(cache: &RangeCache, state: &EditorState, point: Point) -> Result<usize, ReconcileError> {
    let entry = cache
        .get(point.key)
        .ok_or(ReconcileError::PointMappingFailure {
            key: point.key,
            offset: point.offset,
        })?;
    let children_start = entry.location + entry.preamble_len;
    match point.side {
        Side::Text => {
            let clamped = point.offset.min(entry.text_len as usize) as u32;
            Ok((children_start + entry.children_len + clamped) as usize)
        }
        Side::Element => {
            let children = state.children_of(point.key);
            let mut sum: u32 = 0;
            for &child in children.iter().take(point.offset) {
                if let Some(child_entry) = cache.get(child) {
                    sum += child_entry.entire_len();
                }
            }
            Ok((children_start + sum) as usize)
        }
    }
}

/// Builds the `Point` for a chosen innermost node at `location`, deriving
/// `side`/`offset` from the node's kind: `Element` nodes map to a child
/// index (the count of whole children before `location`), every other kind
/// maps to a text-relative byte offset (clamped to 0 for non-`Text` leaves,
/// which carry no text part of their own).
fn point_for(cache: &RangeCache, state: &EditorState, key: NodeKey, location: usize, affinity: Affinity) -> Point {
    let entry = cache.get(key).copied().unwrap_or_default();
    match state.kind(key) {
        Some(NodeKind::Element { .. }) | Some(NodeKind::Root) => {
            let children_start = (entry.location + entry.preamble_len) as usize;
            let mut offset = 0usize;
            let mut cursor = children_start;
            for &child in state.children_of(key) {
                let child_len = cache.get(child).map(|e| e.entire_len()).unwrap_or(0) as usize;
                if cursor + child_len > location {
                    break;
                }
                cursor += child_len;
                offset += 1;
            }
            Point {
                key,
                offset,
                side: Side::Element,
                affinity,
            }
        }
        _ => {
            let text_start = (entry.location + entry.preamble_len + entry.children_len) as usize;
            let offset = location.saturating_sub(text_start).min(entry.text_len as usize);
            Point {
                key,
                offset,
                side: Side::Text,
                affinity,
            }
        }
    }
}

/// Inverse of [`location_of`]: finds the innermost node whose
/// `[location, location + entire_len)` contains `location`, preferring the
/// narrowest (smallest `entire_len`) match so a Text leaf wins over its
/// enclosing Element — iterating in encounter order instead would always
/// match the outermost (typically the root) container first, since document
/// order places a parent before its children at a shared location (§4.7).
///
/// When `location` sits exactly on a boundary between two nodes (or at the
/// very start/end of the buffer, where no node's range contains it under
/// half-open semantics), `affinity` resolves which neighbor claims it:
/// `Forward` prefers the node that *starts* there, `Backward` the node that
/// *ends* there, falling back to whichever side actually exists.
pub fn point_of(cache: &RangeCache, state: &EditorState, location: usize, affinity: Affinity) -> Result<Point, ReconcileError> {
    let mut interior: Option<(NodeKey, u32)> = None;
    for key in cache.order.iter() {
        let Some(entry) = cache.get(key) else { continue };
        let range = entry.entire_range();
        if range.start < location && location < range.end {
            let len = entry.entire_len();
            if interior.map(|(_, best)| len < best).unwrap_or(true) {
                interior = Some((key, len));
            }
        }
    }
    if let Some((key, _)) = interior {
        return Ok(point_for(cache, state, key, location, affinity));
    }

    let mut starts: Option<(NodeKey, u32)> = None;
    let mut ends: Option<(NodeKey, u32)> = None;
    for key in cache.order.iter() {
        let Some(entry) = cache.get(key) else { continue };
        let range = entry.entire_range();
        let len = entry.entire_len();
        if range.start == location && starts.map(|(_, best)| len < best).unwrap_or(true) {
            starts = Some((key, len));
        }
        if range.end == location && ends.map(|(_, best)| len < best).unwrap_or(true) {
            ends = Some((key, len));
        }
    }

    let chosen = match affinity {
        Affinity::Forward => starts.or(ends),
        Affinity::Backward => ends.or(starts),
    };

    let Some((key, _)) = chosen else {
        return Err(ReconcileError::PointMappingFailure {
            key: NodeKey::ROOT,
            offset: location,
        });
    };
    Ok(point_for(cache, state, key, location, affinity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_tree::{NodeRecord, TextFormat};
    use crate::range_cache::RangeCacheEntry;

    #[test]
    fn location_of_point_round_trips_through_cache() {
        let mut cache = RangeCache::new();
        let key = NodeKey(7);
        cache.insert(
            key,
            RangeCacheEntry {
                location: 10,
                preamble_len: 2,
                children_len: 0,
                text_len: 5,
                postamble_len: 0,
                preamble_special_len: 0,
            },
        );
        cache.order.rebuild([key]);

        let mut state = EditorState::empty();
        state
            .node_map
            .insert(key, NodeRecord::text(key, NodeKey::ROOT, "hello", TextFormat::default()));

        let point = Point {
            key,
            offset: 3,
            side: Side::Text,
            affinity: Affinity::Forward,
        };
        let location = location_of(&cache, &state, point).unwrap();
        assert_eq!(location, 15);

        let recovered = point_of(&cache, &state, location, Affinity::Forward).unwrap();
        assert_eq!(recovered.key, key);
        assert_eq!(recovered.offset, 3);
    }

    #[test]
    fn missing_key_yields_point_mapping_failure() {
        let cache = RangeCache::new();
        let state = EditorState::empty();
        let point = Point {
            key: NodeKey(1),
            offset: 0,
            side: Side::Text,
            affinity: Affinity::Forward,
        };
        assert!(location_of(&cache, &state, point).is_err());
    }

    /// Root -> Paragraph(Element) -> Text("Hello"), Text(" there"). A
    /// location inside the second text run must resolve to that run, not to
    /// the paragraph or the root, even though both ancestors' ranges also
    /// contain it (§4.7's innermost-match requirement).
    fn nested_state_and_cache() -> (EditorState, RangeCache, NodeKey, NodeKey, NodeKey) {
        let mut state = EditorState::empty();
        let para = NodeKey(1);
        let run_a = NodeKey(2);
        let run_b = NodeKey(3);

        let mut root = state.node_map.get(&NodeKey::ROOT).unwrap().clone();
        root.children = vec![para];
        state.node_map.insert(NodeKey::ROOT, root);

        let mut para_record = NodeRecord::element(para, NodeKey::ROOT, false);
        para_record.children = vec![run_a, run_b];
        state.node_map.insert(para, para_record);

        state
            .node_map
            .insert(run_a, NodeRecord::text(run_a, para, "Hello", TextFormat::default()));
        state
            .node_map
            .insert(run_b, NodeRecord::text(run_b, para, " there", TextFormat::default()));

        let mut cache = RangeCache::new();
        cache.insert(NodeKey::ROOT, RangeCacheEntry { location: 0, children_len: 11, ..Default::default() });
        cache.insert(para, RangeCacheEntry { location: 0, children_len: 11, ..Default::default() });
        cache.insert(run_a, RangeCacheEntry { location: 0, text_len: 5, ..Default::default() });
        cache.insert(run_b, RangeCacheEntry { location: 5, text_len: 6, ..Default::default() });
        cache.order.rebuild([NodeKey::ROOT, para, run_a, run_b]);

        (state, cache, para, run_a, run_b)
    }

    #[test]
    fn point_of_resolves_to_the_innermost_text_node_not_the_root() {
        let (state, cache, _para, _run_a, run_b) = nested_state_and_cache();

        // Absolute location 7 sits inside run_b ("there"), byte offset 2.
        let point = point_of(&cache, &state, 7, Affinity::Forward).unwrap();
        assert_eq!(point.key, run_b);
        assert_eq!(point.side, Side::Text);
        assert_eq!(point.offset, 2);
    }

    #[test]
    fn point_of_round_trips_every_location_in_a_nested_document() {
        let (state, cache, ..) = nested_state_and_cache();
        for location in 0..=11usize {
            let point = point_of(&cache, &state, location, Affinity::Forward).unwrap();
            let recovered = location_of(&cache, &state, point).unwrap();
            assert_eq!(recovered, location, "round trip failed at location {location}");
        }
    }

    #[test]
    fn element_side_location_sums_entire_len_of_prior_children() {
        let (state, cache, para, _run_a, run_b) = nested_state_and_cache();
        let point = Point {
            key: para,
            offset: 1,
            side: Side::Element,
            affinity: Affinity::Forward,
        };
        let location = location_of(&cache, &state, point).unwrap();
        assert_eq!(location, cache.get(run_b).unwrap().location as usize);
    }
}
