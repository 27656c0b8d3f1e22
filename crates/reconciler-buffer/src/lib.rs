//! A concrete, `xi_rope`-backed implementation of the reconciler's backing
//! text buffer (spec §6.2–§6.4): an attributed string with ranged attribute
//! fixing, attachment glyphs for decorators, and a block-level paragraph
//! style pass.

pub mod attributes;
pub mod block_style;
pub mod buffer;
pub mod error;

pub use attributes::{AttributeMap, AttributeValue};
pub use block_style::{apply_block_level_attributes, BlockLevelAttributes};
pub use buffer::{AttachmentMetadata, AttributedBuffer, AttributedString};
pub use error::BufferError;
