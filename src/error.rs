use std::io;

use thiserror::Error;

/// Result type used by `stream-duplicator`.
pub type DuplicatorResult<T> = Result<T, DuplicatorError>;

/// Errors a [`DuplicatorReader`](crate::DuplicatorReader) can report.
///
/// Callers should treat [`BackpressureLimit`](DuplicatorError::BackpressureLimit)
/// as "try again later" and everything else as "this reader cannot make progress".
#[derive(Debug, Error)]
pub enum DuplicatorError {
    /// The reader is as far ahead of the slowest active reader as the
    /// configured limit allows. Nothing was consumed.
    #[error("reached max offset difference")]
    BackpressureLimit,

    /// The source has no more bytes.
    #[error("end of stream")]
    EndOfStream,

    /// The bytes at `offset` were already pulled from the source and have
    /// since been evicted from the cache.
    #[error("bytes at offset {offset} are no longer cached")]
    Evicted { offset: u64 },

    /// The reader was closed.
    #[error("reader is closed")]
    Closed,

    /// The source failed; the error is passed through untouched.
    #[error("source error: {0}")]
    Source(#[from] io::Error),
}

impl DuplicatorError {
    /// Whether this is the retryable backpressure rejection.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, DuplicatorError::BackpressureLimit)
    }

    /// Whether the source ran out of bytes.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DuplicatorError::EndOfStream)
    }

    /// Converts into an [`io::Error`] for the [`Read`](std::io::Read) adapter.
    ///
    /// Source errors are returned verbatim; the backpressure rejection maps to
    /// [`io::ErrorKind::WouldBlock`].
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            DuplicatorError::Source(err) => err,
            DuplicatorError::BackpressureLimit => io::Error::new(io::ErrorKind::WouldBlock, self),
            DuplicatorError::EndOfStream => io::Error::new(io::ErrorKind::UnexpectedEof, self),
            DuplicatorError::Evicted { .. } => io::Error::new(io::ErrorKind::NotFound, self),
            DuplicatorError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, self),
        }
    }
}
