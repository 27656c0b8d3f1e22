use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("range {range:?} is out of bounds for buffer of length {length}")]
    OutOfBounds { range: Range<usize>, length: usize },

    #[error("range {range:?} splits a grapheme or UTF-16 surrogate pair")]
    MisalignedBoundary { range: Range<usize> },

    #[error("no attachment metadata registered at location {location}")]
    UnknownAttachment { location: usize },

    #[error("edit session already open; sessions do not nest")]
    SessionAlreadyOpen,

    #[error("no edit session is open")]
    NoSessionOpen,
}
