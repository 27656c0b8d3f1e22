use std::collections::BTreeMap;
use std::ops::Range;

use xi_rope::delta::{Builder, Transformer};
use xi_rope::Rope;

use crate::attributes::AttributeMap;
use crate::error::BufferError;

/// Per-attachment metadata for a single U+FFFC code point in the buffer.
/// Decorator identity itself lives in the reconciler's range cache; this is
/// only the opaque payload the buffer carries alongside the attachment char.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMetadata {
    pub tag: String,
}

/// A free-standing attributed run of text, independent of any buffer. This
/// is both the argument type for [`AttributedBuffer::replace`] and the
/// return type of [`AttributedBuffer::attributed_substring`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributedString {
    pub text: String,
    /// Attribute runs, ranges relative to `text`.
    pub spans: Vec<(Range<usize>, AttributeMap)>,
    /// Attachment positions, offsets relative to `text`.
    pub attachments: BTreeMap<usize, AttachmentMetadata>,
}

impl AttributedString {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
            attachments: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// An `xi_rope::Rope`-backed attributed text buffer implementing the
/// reconciler's backing-buffer interface. Text edits are applied one at a
/// time via a small `xi_rope::delta::Delta`; attribute spans and attachment
/// positions ride along by being shifted through the same delta with a
/// `Transformer`, the way the teacher shifts anchor ranges through command
/// deltas.
#[derive(Debug)]
pub struct AttributedBuffer {
    rope: Rope,
    spans: Vec<(Range<usize>, AttributeMap)>,
    attachments: BTreeMap<usize, AttachmentMetadata>,
    session_open: bool,
}

impl Default for AttributedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributedBuffer {
    pub fn new() -> Self {
        Self {
            rope: Rope::from(""),
            spans: Vec::new(),
            attachments: BTreeMap::new(),
            session_open: false,
        }
    }

    pub fn from_attributed(content: &AttributedString) -> Self {
        let mut buffer = Self::new();
        buffer.rope = Rope::from(content.text.as_str());
        buffer.spans = content.spans.clone();
        buffer.attachments = content.attachments.clone();
        buffer
    }

    /// §6.2 `length()`.
    pub fn length(&self) -> usize {
        self.rope.len()
    }

    pub fn as_str(&self) -> String {
        self.rope.to_string()
    }

    fn check_bounds(&self, range: &Range<usize>) -> Result<(), BufferError> {
        let len = self.rope.len();
        if range.start > range.end || range.end > len {
            return Err(BufferError::OutOfBounds {
                range: range.clone(),
                length: len,
            });
        }
        let text = self.rope.slice_to_cow(0..len);
        if !text.is_char_boundary(range.start) || !text.is_char_boundary(range.end) {
            return Err(BufferError::MisalignedBoundary {
                range: range.clone(),
            });
        }
        Ok(())
    }

    /// §6.2 `attributed_substring(range)`.
    pub fn attributed_substring(&self, range: Range<usize>) -> Result<AttributedString, BufferError> {
        self.check_bounds(&range)?;
        let text = self.rope.slice_to_cow(range.clone()).into_owned();
        let spans = self
            .spans
            .iter()
            .filter(|(r, _)| r.start < range.end && r.end > range.start)
            .map(|(r, attrs)| {
                let start = r.start.max(range.start) - range.start;
                let end = r.end.min(range.end) - range.start;
                (start..end, attrs.clone())
            })
            .collect();
        let attachments = self
            .attachments
            .iter()
            .filter(|(loc, _)| range.contains(loc))
            .map(|(loc, meta)| (loc - range.start, meta.clone()))
            .collect();
        Ok(AttributedString {
            text,
            spans,
            attachments,
        })
    }

    /// §6.2 `begin_edit()`. Batch sessions do not nest.
    pub fn begin_edit(&mut self) -> Result<(), BufferError> {
        if self.session_open {
            return Err(BufferError::SessionAlreadyOpen);
        }
        self.session_open = true;
        Ok(())
    }

    /// §6.2 `replace(range, attributed_string)`.
    pub fn replace(
        &mut self,
        range: Range<usize>,
        content: &AttributedString,
    ) -> Result<(), BufferError> {
        if !self.session_open {
            return Err(BufferError::NoSessionOpen);
        }
        self.check_bounds(&range)?;

        let mut builder = Builder::new(self.rope.len());
        builder.replace(range.clone(), Rope::from(content.text.as_str()));
        let delta = builder.build();
        let mut transformer = Transformer::new(&delta);

        let mut next_spans = Vec::with_capacity(self.spans.len());
        for (r, attrs) in self.spans.drain(..) {
            let new_start = transformer.transform(r.start, true);
            let new_end = transformer.transform(r.end, false);
            if new_start < new_end {
                next_spans.push((new_start..new_end, attrs));
            }
        }
        self.spans = next_spans;

        let mut next_attachments = BTreeMap::new();
        for (loc, meta) in self.attachments.iter() {
            // Attachments inside the replaced range are removed; callers that
            // want to keep a decorator re-supply it via `content.attachments`.
            if *loc >= range.start && *loc < range.end {
                continue;
            }
            let new_loc = transformer.transform(*loc, false);
            next_attachments.insert(new_loc, meta.clone());
        }
        self.attachments = next_attachments;

        self.rope = delta.apply(&self.rope);

        for (r, attrs) in &content.spans {
            self.spans.push(((r.start + range.start)..(r.end + range.start), attrs.clone()));
        }
        for (loc, meta) in &content.attachments {
            self.attachments.insert(loc + range.start, meta.clone());
        }

        Ok(())
    }

    /// §6.2 `set_attributes(range, attrs)`.
    pub fn set_attributes(&mut self, range: Range<usize>, attrs: AttributeMap) -> Result<(), BufferError> {
        if !self.session_open {
            return Err(BufferError::NoSessionOpen);
        }
        self.check_bounds(&range)?;
        self.spans.push((range, attrs));
        Ok(())
    }

    /// §6.2 `fix_attributes(range)`. Coalesces overlapping runs within
    /// `range` into a minimal, non-overlapping set — later-pushed spans win
    /// conflicting keys, mirroring last-write-wins attribute application.
    pub fn fix_attributes(&mut self, range: Range<usize>) -> Result<(), BufferError> {
        if !self.session_open {
            return Err(BufferError::NoSessionOpen);
        }
        self.check_bounds(&range)?;

        let (mut inside, outside): (Vec<_>, Vec<_>) = self
            .spans
            .drain(..)
            .partition(|(r, _)| r.start < range.end && r.end > range.start);
        inside.sort_by_key(|(r, _)| (r.start, r.end));

        let mut boundaries: Vec<usize> = inside
            .iter()
            .flat_map(|(r, _)| [r.start.max(range.start), r.end.min(range.end)])
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut merged = Vec::new();
        for window in boundaries.windows(2) {
            let (start, end) = (window[0], window[1]);
            if start >= end {
                continue;
            }
            let mut attrs = AttributeMap::new();
            for (r, span_attrs) in &inside {
                if r.start <= start && end <= r.end {
                    for (k, v) in span_attrs {
                        attrs.insert(k.clone(), v.clone());
                    }
                }
            }
            if !attrs.is_empty() {
                merged.push((start..end, attrs));
            }
        }

        self.spans = outside;
        self.spans.extend(merged);
        Ok(())
    }

    /// §6.2 `end_edit()`.
    pub fn end_edit(&mut self) -> Result<(), BufferError> {
        if !self.session_open {
            return Err(BufferError::NoSessionOpen);
        }
        self.session_open = false;
        Ok(())
    }
}
