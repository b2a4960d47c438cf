//! Error taxonomy for the public engine surface.

use std::io;
use thiserror::Error;

/// Errors surfaced by [`crate::Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// A precondition on caller-supplied arguments was violated: an empty
    /// key, or mismatched `keys`/`values` lengths in a batch.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying I/O error from a segment file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A segment's index could not be reconciled with its file contents.
    #[error("corrupt segment")]
    Corrupt,

    /// A single record does not fit in a segment even when it is fresh.
    #[error("record too large for a single segment")]
    TooLarge,

    /// The operation was attempted after `close()`.
    #[error("engine is closed")]
    Closed,
}

impl From<segment::SegmentError> for EngineError {
    fn from(e: segment::SegmentError) -> Self {
        match e {
            segment::SegmentError::Io(io_err) => EngineError::Io(io_err),
            segment::SegmentError::Corrupt => EngineError::Corrupt,
        }
    }
}
