//! Paragraph-style pass (spec §6.3).

use std::ops::Range;

use crate::attributes::{keys, AttributeMap, AttributeValue};
use crate::buffer::AttributedBuffer;
use crate::error::BufferError;

/// Box/paragraph-level attributes a node contributes to the block-style pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockLevelAttributes {
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub padding_top: f64,
    pub padding_bottom: f64,
    pub indent_level: u32,
    pub indent_size: f64,
}

/// Byte offsets of each paragraph (line, in the buffer's terms) contained
/// in a node's entire range, in document order.
pub fn paragraph_ranges_in(buffer: &AttributedBuffer, range: Range<usize>) -> Vec<Range<usize>> {
    let text = buffer.as_str();
    let slice = &text[range.clone()];
    let mut out = Vec::new();
    let mut start = range.start;
    for (offset, ch) in slice.char_indices() {
        if ch == '\n' {
            let end = range.start + offset + 1;
            out.push(start..end);
            start = end;
        }
    }
    if start < range.end {
        out.push(start..range.end);
    }
    out
}

/// `apply_block_level_attributes` (§6.3): sets paragraph-style attributes on
/// every paragraph spanned by a node, adding spacing-before to the first and
/// spacing-after to the last, with indent contributing to both head-indent
/// keys uniformly across the node's paragraphs.
pub fn apply_block_level_attributes(
    buffer: &mut AttributedBuffer,
    block_attrs: BlockLevelAttributes,
    node_range: Range<usize>,
) -> Result<(), BufferError> {
    let paragraphs = paragraph_ranges_in(buffer, node_range.clone());
    if paragraphs.is_empty() {
        return Ok(());
    }

    let indent = f64::from(block_attrs.indent_level) * block_attrs.indent_size;
    let last_index = paragraphs.len() - 1;

    for (i, paragraph) in paragraphs.iter().enumerate() {
        let mut attrs = AttributeMap::new();
        attrs.insert(
            keys::INDENT_INTERNAL.to_string(),
            AttributeValue::Float(indent),
        );

        let mut spacing_before = 0.0;
        if i == 0 {
            spacing_before += block_attrs.margin_top + block_attrs.padding_top;
        }
        attrs.insert(
            keys::PARAGRAPH_SPACING_BEFORE_INTERNAL.to_string(),
            AttributeValue::Float(spacing_before),
        );

        let mut spacing_after = 0.0;
        if i == last_index {
            spacing_after += block_attrs.margin_bottom + block_attrs.padding_bottom;
        }
        attrs.insert(
            keys::PARAGRAPH_SPACING_INTERNAL.to_string(),
            AttributeValue::Float(spacing_after),
        );
        attrs.insert(
            keys::APPLIED_BLOCK_LEVEL_STYLES_INTERNAL.to_string(),
            AttributeValue::Bool(true),
        );

        buffer.set_attributes(paragraph.clone(), attrs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AttributedString;

    #[test]
    fn first_and_last_paragraph_carry_spacing() {
        let mut buffer =
            AttributedBuffer::from_attributed(&AttributedString::plain("line one\nline two\nline three"));
        buffer.begin_edit().unwrap();
        apply_block_level_attributes(
            &mut buffer,
            BlockLevelAttributes {
                margin_top: 4.0,
                margin_bottom: 8.0,
                padding_top: 1.0,
                padding_bottom: 2.0,
                indent_level: 2,
                indent_size: 10.0,
            },
            0..buffer.length(),
        )
        .unwrap();
        buffer.end_edit().unwrap();

        let first = buffer.attributed_substring(0..1).unwrap();
        let (_, attrs) = &first.spans[0];
        assert_eq!(
            attrs.get(keys::PARAGRAPH_SPACING_BEFORE_INTERNAL),
            Some(&AttributeValue::Float(5.0))
        );

        let last = buffer.attributed_substring(buffer.length() - 1..buffer.length()).unwrap();
        let (_, attrs) = &last.spans[0];
        assert_eq!(
            attrs.get(keys::PARAGRAPH_SPACING_INTERNAL),
            Some(&AttributeValue::Float(10.0))
        );
        assert_eq!(
            attrs.get(keys::INDENT_INTERNAL),
            Some(&AttributeValue::Float(20.0))
        );
    }
}
