use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Default)]
struct Counters {
    active_readers: AtomicU64,
    source_fetches: AtomicU64,
    cache_hits: AtomicU64,
}

/// Runtime metrics for a `StreamDuplicator`.
///
/// A lightweight, read-only view shared by every clone of the duplicator.
/// Obtain a `Stats` handle via `StreamDuplicator::stats()`. Values use relaxed
/// atomics and are intended for diagnostics.
#[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
#[derive(Debug, Clone, Default)]
pub struct Stats {
    counters: Arc<Counters>,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reader_added(&self) {
        self.counters.active_readers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reader_closed(&self) {
        self.counters.active_readers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn source_fetch(&self) {
        self.counters.source_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_hit(&self) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of readers that have been added and not yet closed.
    pub fn active_readers(&self) -> u64 {
        self.counters.active_readers.load(Ordering::Relaxed)
    }

    /// Returns how many times the source's `read` was invoked.
    pub fn source_fetches(&self) -> u64 {
        self.counters.source_fetches.load(Ordering::Relaxed)
    }

    /// Returns how many read steps were served from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.counters.cache_hits.load(Ordering::Relaxed)
    }
}
