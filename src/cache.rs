//! Sparse cache of chunks already pulled from the source.
//!
//! Chunks are keyed by the stream offset of their first byte and never
//! overlap. Since the source is consumed strictly in order and eviction only
//! drops chunks from the front, the cached chunks always form one contiguous
//! run of the stream.

use std::collections::BTreeMap;

use bytes::Bytes;

#[derive(Debug, Default)]
pub(crate) struct ChunkCache {
    chunks: BTreeMap<u64, Bytes>,
    total_bytes: usize,
}

impl ChunkCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` as the chunk starting at `start`.
    pub(crate) fn insert(&mut self, start: u64, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }

        debug_assert!(
            self.chunks
                .range(..start)
                .next_back()
                .map_or(true, |(s, c)| s + c.len() as u64 <= start),
            "chunk at {start} overlaps its predecessor"
        );
        debug_assert!(
            self.chunks
                .range(start..)
                .next()
                .map_or(true, |(s, _)| start + bytes.len() as u64 <= *s),
            "chunk at {start} overlaps its successor"
        );

        self.total_bytes += bytes.len();
        self.chunks.insert(start, bytes);
    }

    /// Returns the chunk holding `offset` together with the position of
    /// `offset` inside it.
    pub(crate) fn covering(&self, offset: u64) -> Option<(&Bytes, usize)> {
        let (start, chunk) = self.chunks.range(..=offset).next_back()?;
        let pos = (offset - start) as usize;
        (pos < chunk.len()).then_some((chunk, pos))
    }

    /// Drops every chunk that ends at or before `min_offset`.
    ///
    /// Returns the number of chunks removed.
    pub(crate) fn evict_below(&mut self, min_offset: u64) -> usize {
        let mut evicted = 0;
        while let Some(entry) = self.chunks.first_entry() {
            if *entry.key() + entry.get().len() as u64 > min_offset {
                break;
            }
            self.total_bytes -= entry.remove().len();
            evicted += 1;
        }
        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
