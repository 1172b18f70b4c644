use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::cache::ChunkCache;
use crate::registry::{ReaderId, ReaderRegistry};
use crate::{DuplicatorError, DuplicatorReader, DuplicatorResult};

/// Construction options for a [`StreamDuplicator`].
///
/// ```
/// use stream_duplicator::{DuplicatorOptions, StreamDuplicator};
///
/// let options = DuplicatorOptions::new().with_max_offset_diff(4).with_readers(2);
/// let (duplicator, readers) = StreamDuplicator::with_options(&b"ABCDEFGHIJ"[..], options);
///
/// assert_eq!(duplicator.max_offset_diff(), 4);
/// assert_eq!(readers.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicatorOptions {
    /// How far the fastest reader may run ahead of the slowest one.
    /// `0` disables the limit.
    pub max_offset_diff: u64,

    /// Number of readers to create together with the duplicator.
    pub readers: usize,
}

impl DuplicatorOptions {
    /// Options for an unlimited duplicator without pre-created readers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backpressure limit, `0` meaning unlimited.
    pub fn with_max_offset_diff(mut self, max_offset_diff: u64) -> Self {
        self.max_offset_diff = max_offset_diff;
        self
    }

    /// Sets how many readers `StreamDuplicator::with_options` creates.
    pub fn with_readers(mut self, readers: usize) -> Self {
        self.readers = readers;
        self
    }
}

/// Everything the readers of one duplicator share.
pub(crate) struct Shared<R> {
    pub(crate) state: Mutex<State>,
    // Signalled whenever an in-flight fetch finishes, successful or not.
    fetched: Condvar,
    // Only touched by the reader holding the fetch reservation.
    source: Mutex<R>,
    pub(crate) max_offset_diff: u64,
    #[cfg(feature = "stats")]
    pub(crate) stats: crate::stats::Stats,
}

#[derive(Debug)]
pub(crate) struct State {
    pub(crate) cache: ChunkCache,
    pub(crate) registry: ReaderRegistry,
    /// Number of bytes pulled from the source so far.
    pub(crate) source_pos: u64,
    fetching: bool,
    // Bumped every time a fetch finishes.
    fetch_generation: u64,
    last_failure: Option<FailedFetch>,
    exhausted: bool,
    #[cfg(test)]
    waiting: usize,
}

/// What waiting readers learn about a fetch that failed under them.
#[derive(Debug)]
struct FailedFetch {
    generation: u64,
    kind: io::ErrorKind,
    message: String,
}

impl FailedFetch {
    fn to_error(&self) -> DuplicatorError {
        DuplicatorError::Source(io::Error::new(self.kind, self.message.clone()))
    }
}

impl State {
    fn new() -> Self {
        Self {
            cache: ChunkCache::new(),
            registry: ReaderRegistry::new(),
            source_pos: 0,
            fetching: false,
            fetch_generation: 0,
            last_failure: None,
            exhausted: false,
            #[cfg(test)]
            waiting: 0,
        }
    }

    /// Records the new offset of `id` and drops chunks nobody needs anymore.
    pub(crate) fn advance(&mut self, id: ReaderId, offset: u64) {
        self.registry.advance(id, offset);
        self.evict();
    }

    /// Removes every chunk that all open readers have passed.
    ///
    /// Nothing is evicted while no reader is attached: a reader added later
    /// starts at offset 0 and may still need the cached bytes.
    pub(crate) fn evict(&mut self) {
        let Some(min_offset) = self.registry.min_offset() else {
            return;
        };
        let evicted = self.cache.evict_below(min_offset);
        if evicted > 0 {
            trace!(
                evicted,
                min_offset,
                remaining = self.cache.len(),
                "evicted cached chunks"
            );
        }
    }
}

impl<R> Shared<R>
where
    R: Read + Send,
{
    /// Pulls up to `len` bytes from the source at the current source position.
    ///
    /// Only one fetch runs at a time. A caller that finds another fetch in
    /// flight waits for it to finish. If that fetch succeeded it gets
    /// `Ok(None)` and must look the cache up again; if it failed it gets the
    /// same source error, and the source is not read again on its behalf. On success the chunk is already cached when
    /// this returns, keyed at the position it was read from. The state lock is
    /// released while the source is being read.
    pub(crate) fn fetch(
        &self,
        state: &mut MutexGuard<'_, State>,
        len: usize,
    ) -> DuplicatorResult<Option<Bytes>> {
        if state.exhausted {
            return Err(DuplicatorError::EndOfStream);
        }
        if state.fetching {
            let generation = state.fetch_generation;
            #[cfg(test)]
            {
                state.waiting += 1;
            }
            while state.fetching && state.fetch_generation == generation {
                self.fetched.wait(&mut *state);
            }
            #[cfg(test)]
            {
                state.waiting -= 1;
            }
            return match &state.last_failure {
                Some(failure) if failure.generation > generation => Err(failure.to_error()),
                _ if state.exhausted => Err(DuplicatorError::EndOfStream),
                _ => Ok(None),
            };
        }

        state.fetching = true;
        let start = state.source_pos;
        let result = MutexGuard::unlocked(&mut *state, || self.read_source(len));
        state.fetching = false;
        state.fetch_generation += 1;
        self.fetched.notify_all();

        match result {
            Ok(bytes) if bytes.is_empty() => {
                debug!(offset = start, "source reached end of stream");
                state.exhausted = true;
                Err(DuplicatorError::EndOfStream)
            }
            Ok(bytes) => {
                trace!(offset = start, len = bytes.len(), "fetched chunk from source");
                state.source_pos += bytes.len() as u64;
                state.cache.insert(start, bytes.clone());
                Ok(Some(bytes))
            }
            Err(err) => {
                debug!(offset = start, error = %err, "source read failed");
                state.last_failure = Some(FailedFetch {
                    generation: state.fetch_generation,
                    kind: err.kind(),
                    message: err.to_string(),
                });
                Err(DuplicatorError::Source(err))
            }
        }
    }

    fn read_source(&self, len: usize) -> io::Result<Bytes> {
        #[cfg(feature = "stats")]
        self.stats.source_fetch();

        let mut buf = vec![0u8; len];
        let n = self.source.lock().read(&mut buf)?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }
}

/// Fans a single [`Read`] source out to any number of [`DuplicatorReader`]s.
///
/// Every byte is pulled from the source exactly once. Bytes a reader pulls
/// are cached until every open reader has consumed them, so slower readers
/// are served from memory. With a non-zero `max_offset_diff`, a reader that
/// gets that far ahead of the slowest open reader has its reads rejected with
/// [`DuplicatorError::BackpressureLimit`] until the others catch up.
///
/// Clone is cheap; all clones refer to the same source and cache. The source
/// is dropped once the duplicator and all of its readers are gone.
///
/// ```
/// use std::io::Read;
/// use stream_duplicator::StreamDuplicator;
///
/// let (_duplicator, mut readers) = StreamDuplicator::with_readers(&b"HELLO"[..], 2);
///
/// let mut first = String::new();
/// readers[0].read_to_string(&mut first).unwrap();
///
/// let mut second = String::new();
/// readers[1].read_to_string(&mut second).unwrap();
///
/// assert_eq!(first, "HELLO");
/// assert_eq!(second, "HELLO");
/// ```
pub struct StreamDuplicator<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for StreamDuplicator<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> fmt::Debug for StreamDuplicator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("StreamDuplicator")
            .field("max_offset_diff", &self.shared.max_offset_diff)
            .field("readers", &state.registry.len())
            .field("cached_chunks", &state.cache.len())
            .field("source_pos", &state.source_pos)
            .finish_non_exhaustive()
    }
}

impl<R> StreamDuplicator<R>
where
    R: Read + Send,
{
    /// Creates a duplicator without a backpressure limit.
    pub fn new(source: R) -> Self {
        Self::with_max_offset_diff(source, 0)
    }

    /// Creates a duplicator whose readers may not run more than
    /// `max_offset_diff` bytes ahead of the slowest open reader.
    ///
    /// `0` disables the limit.
    pub fn with_max_offset_diff(source: R, max_offset_diff: u64) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new()),
                fetched: Condvar::new(),
                source: Mutex::new(source),
                max_offset_diff,
                #[cfg(feature = "stats")]
                stats: crate::stats::Stats::new(),
            }),
        }
    }

    /// Creates a duplicator without a backpressure limit together with
    /// `readers` readers.
    pub fn with_readers(source: R, readers: usize) -> (Self, Vec<DuplicatorReader<R>>) {
        Self::with_options(source, DuplicatorOptions::new().with_readers(readers))
    }

    /// Creates a duplicator from `options`, together with the readers it asks for.
    pub fn with_options(source: R, options: DuplicatorOptions) -> (Self, Vec<DuplicatorReader<R>>) {
        let duplicator = Self::with_max_offset_diff(source, options.max_offset_diff);
        let readers = (0..options.readers)
            .map(|_| duplicator.add_reader())
            .collect();
        (duplicator, readers)
    }

    /// Attaches a new reader starting at offset 0.
    ///
    /// A reader added after others have progressed re-reads the stream from
    /// the beginning, which only works while those bytes are still cached.
    /// Otherwise its reads fail with [`DuplicatorError::Evicted`].
    pub fn add_reader(&self) -> DuplicatorReader<R> {
        let id = self.shared.state.lock().registry.register();
        debug!(reader = %id, "reader added");

        #[cfg(feature = "stats")]
        self.shared.stats.reader_added();

        DuplicatorReader::new(id, Arc::clone(&self.shared))
    }
}

impl<R> StreamDuplicator<R> {
    /// The configured backpressure limit, `0` meaning unlimited.
    pub fn max_offset_diff(&self) -> u64 {
        self.shared.max_offset_diff
    }

    /// Number of open readers.
    pub fn reader_count(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    /// Smallest offset among open readers.
    ///
    /// `None` while no reader is attached, in which case no bound applies.
    pub fn min_offset(&self) -> Option<u64> {
        self.shared.state.lock().registry.min_offset()
    }

    /// Number of chunks currently held in the cache.
    pub fn cached_chunks(&self) -> usize {
        self.shared.state.lock().cache.len()
    }

    /// Number of bytes currently held in the cache.
    pub fn cached_bytes(&self) -> usize {
        self.shared.state.lock().cache.total_bytes()
    }

    /// Total number of bytes pulled from the source so far.
    pub fn fetched_bytes(&self) -> u64 {
        self.shared.state.lock().source_pos
    }

    /// Whether the source has reported end of stream.
    pub fn is_exhausted(&self) -> bool {
        self.shared.state.lock().exhausted
    }

    /// Returns a handle to the runtime metrics of this duplicator.
    ///
    /// ```
    /// use std::io::Read;
    /// use stream_duplicator::StreamDuplicator;
    ///
    /// let duplicator = StreamDuplicator::new(&b"ABCD"[..]);
    /// let stats = duplicator.stats();
    ///
    /// let mut reader = duplicator.add_reader();
    /// assert_eq!(stats.active_readers(), 1);
    ///
    /// let mut buf = [0u8; 4];
    /// reader.read_exact(&mut buf).unwrap();
    /// assert_eq!(stats.source_fetches(), 1);
    ///
    /// reader.close();
    /// assert_eq!(stats.active_readers(), 0);
    /// ```
    #[cfg(feature = "stats")]
    #[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
    pub fn stats(&self) -> crate::stats::Stats {
        self.shared.stats.clone()
    }
}
