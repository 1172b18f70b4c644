use std::collections::HashMap;
use std::fmt;

/// Identity of a reader attached to a [`StreamDuplicator`](crate::StreamDuplicator).
///
/// Ids are handed out from a counter and never reused by the same duplicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(u64);

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader#{}", self.0)
    }
}

/// Offsets of the readers that are still open.
#[derive(Debug, Default)]
pub(crate) struct ReaderRegistry {
    offsets: HashMap<ReaderId, u64>,
    next_id: u64,
}

impl ReaderRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a new reader at offset 0.
    pub(crate) fn register(&mut self) -> ReaderId {
        let id = ReaderId(self.next_id);
        self.next_id += 1;
        self.offsets.insert(id, 0);
        id
    }

    pub(crate) fn advance(&mut self, id: ReaderId, offset: u64) {
        if let Some(current) = self.offsets.get_mut(&id) {
            debug_assert!(offset >= *current, "{id} moved backwards");
            *current = offset;
        }
    }

    /// Returns `false` if the reader was not registered.
    pub(crate) fn unregister(&mut self, id: ReaderId) -> bool {
        self.offsets.remove(&id).is_some()
    }

    /// Smallest offset among open readers, `None` when nobody is attached.
    pub(crate) fn min_offset(&self) -> Option<u64> {
        self.offsets.values().copied().min()
    }

    pub(crate) fn len(&self) -> usize {
        self.offsets.len()
    }
}
