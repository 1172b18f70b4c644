use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::duplicator::Shared;
use crate::registry::ReaderId;
use crate::DuplicatorError;

/// Result of [`DuplicatorReader::read_outcome`].
///
/// A read can copy some bytes and still fail afterwards, so the byte count
/// and the error are reported together.
#[derive(Debug)]
#[must_use]
pub struct ReadOutcome {
    /// Bytes copied into the caller's buffer during this call.
    pub copied: usize,
    /// Why the read stopped before filling the request, if it did.
    pub error: Option<DuplicatorError>,
}

impl ReadOutcome {
    fn complete(copied: usize) -> Self {
        Self {
            copied,
            error: None,
        }
    }

    fn failed(copied: usize, error: DuplicatorError) -> Self {
        Self {
            copied,
            error: Some(error),
        }
    }

    /// Whether the whole request was satisfied.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// One consumer of a [`StreamDuplicator`](crate::StreamDuplicator).
///
/// Each reader sees the full stream from offset 0, independently of the
/// others. Reading is blocking: a reader may wait on the source, or on
/// another reader that is currently fetching the bytes it needs.
///
/// Readers are meant to be driven from their own thread each. Dropping a
/// reader closes it.
pub struct DuplicatorReader<R> {
    id: ReaderId,
    shared: Arc<Shared<R>>,
    offset: u64,
    closed: bool,
    // Error held back by the `Read` adapter after a partial read.
    pending: Option<DuplicatorError>,
}

impl<R> fmt::Debug for DuplicatorReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicatorReader")
            .field("id", &self.id)
            .field("offset", &self.offset)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<R> DuplicatorReader<R> {
    pub(crate) fn new(id: ReaderId, shared: Arc<Shared<R>>) -> Self {
        Self {
            id,
            shared,
            offset: 0,
            closed: false,
            pending: None,
        }
    }

    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// Number of bytes delivered by this reader so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Detaches this reader from its duplicator.
    ///
    /// The reader no longer holds back cache eviction or the backpressure
    /// minimum of the others. Calling it again is a no-op. The source is
    /// left alone.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.shared.state.lock();
        if state.registry.unregister(self.id) {
            state.evict();

            #[cfg(feature = "stats")]
            self.shared.stats.reader_closed();
        }
        drop(state);

        debug!(reader = %self.id, offset = self.offset, "reader closed");
    }
}

impl<R> DuplicatorReader<R>
where
    R: Read + Send,
{
    /// Reads up to `buf.len()` bytes, reporting the byte count and any error
    /// together.
    ///
    /// The call blocks until the request is filled or an error stops it:
    ///
    /// - With a backpressure limit, a reader already `max_offset_diff` bytes
    ///   ahead of the slowest open reader fails right away with
    ///   [`DuplicatorError::BackpressureLimit`] and copies nothing. Otherwise
    ///   the request is shortened so the limit is not crossed.
    /// - Bytes are served from the cache when possible and pulled from the
    ///   source otherwise.
    /// - A source error, including [`DuplicatorError::EndOfStream`], ends the
    ///   call; bytes copied before it are still counted in
    ///   [`ReadOutcome::copied`].
    ///
    /// ```
    /// use stream_duplicator::{DuplicatorError, StreamDuplicator};
    ///
    /// let duplicator = StreamDuplicator::new(&b"HELLO"[..]);
    /// let mut reader = duplicator.add_reader();
    ///
    /// let mut buf = [0u8; 8];
    /// let outcome = reader.read_outcome(&mut buf);
    ///
    /// assert_eq!(&buf[..outcome.copied], b"HELLO");
    /// assert!(matches!(outcome.error, Some(DuplicatorError::EndOfStream)));
    /// ```
    pub fn read_outcome(&mut self, buf: &mut [u8]) -> ReadOutcome {
        if self.closed {
            return ReadOutcome::failed(0, DuplicatorError::Closed);
        }

        let shared = &*self.shared;
        let mut state = shared.state.lock();

        let mut wanted = buf.len();
        if shared.max_offset_diff > 0 {
            // This reader is registered, so there is always a minimum
            if let Some(min_offset) = state.registry.min_offset() {
                let allowed = min_offset.saturating_add(shared.max_offset_diff);
                if allowed <= self.offset {
                    trace!(
                        reader = %self.id,
                        offset = self.offset,
                        min_offset,
                        "read rejected by backpressure limit"
                    );
                    return ReadOutcome::failed(0, DuplicatorError::BackpressureLimit);
                }
                let headroom = usize::try_from(allowed - self.offset).unwrap_or(usize::MAX);
                wanted = wanted.min(headroom);
            }
        }

        let mut copied = 0;
        while copied < wanted {
            let hit = state.cache.covering(self.offset).map(|(chunk, pos)| {
                let n = (chunk.len() - pos).min(wanted - copied);
                buf[copied..copied + n].copy_from_slice(&chunk[pos..pos + n]);
                n
            });

            if let Some(n) = hit {
                copied += n;
                self.offset += n as u64;
                state.advance(self.id, self.offset);
                trace!(reader = %self.id, offset = self.offset, len = n, "served from cache");

                #[cfg(feature = "stats")]
                shared.stats.cache_hit();
                continue;
            }

            if self.offset < state.source_pos {
                debug!(reader = %self.id, offset = self.offset, "needed bytes were evicted");
                return ReadOutcome::failed(
                    copied,
                    DuplicatorError::Evicted {
                        offset: self.offset,
                    },
                );
            }

            match shared.fetch(&mut state, wanted - copied) {
                Ok(Some(chunk)) => {
                    let n = chunk.len();
                    buf[copied..copied + n].copy_from_slice(&chunk);
                    copied += n;
                    self.offset += n as u64;
                    state.advance(self.id, self.offset);
                }
                // Someone else fetched in the meantime; look again
                Ok(None) => {}
                Err(err) => return ReadOutcome::failed(copied, err),
            }
        }

        ReadOutcome::complete(copied)
    }
}

impl<R> Read for DuplicatorReader<R>
where
    R: Read + Send,
{
    /// Adapts [`read_outcome`](DuplicatorReader::read_outcome) to the
    /// [`Read`] contract.
    ///
    /// End of stream is reported as `Ok(0)`. An error that follows a partial
    /// read is returned by the next call. The backpressure rejection is an
    /// error of kind [`io::ErrorKind::WouldBlock`].
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.pending.take() {
            return Err(err.into_io());
        }

        let ReadOutcome { copied, error } = self.read_outcome(buf);
        match error {
            None => Ok(copied),
            Some(DuplicatorError::EndOfStream) => Ok(copied),
            Some(err) if copied > 0 => {
                self.pending = Some(err);
                Ok(copied)
            }
            Some(err) => Err(err.into_io()),
        }
    }
}

impl<R> Drop for DuplicatorReader<R> {
    fn drop(&mut self) {
        self.close();
    }
}
