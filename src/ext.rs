//! Extension trait for turning readers into a `StreamDuplicator`.
//!
//! This module provides the `DuplicateExt` trait which adds `duplicate` methods
//! to any type that implements `Read + Send`.

use std::io::Read;

use crate::StreamDuplicator;

/// Extension trait for [`Read`] that provides the `duplicate` methods.
///
/// This trait allows any source that meets the requirements to be easily converted
/// into a [`StreamDuplicator`] for sharing across multiple readers.
pub trait DuplicateExt: Read {
    /// Converts this source into a [`StreamDuplicator`] without a backpressure limit.
    ///
    /// ```
    /// use std::io::Read;
    /// use stream_duplicator::DuplicateExt;
    ///
    /// let duplicator = (&b"hello world"[..]).duplicate();
    /// let mut reader = duplicator.add_reader();
    ///
    /// let mut text = String::new();
    /// reader.read_to_string(&mut text).unwrap();
    /// assert_eq!(text, "hello world");
    /// ```
    fn duplicate(self) -> StreamDuplicator<Self>
    where
        Self: Sized + Send,
    {
        StreamDuplicator::new(self)
    }

    /// Converts this source into a [`StreamDuplicator`] whose readers may not
    /// run more than `max_offset_diff` bytes ahead of the slowest one.
    fn duplicate_with_max_offset_diff(self, max_offset_diff: u64) -> StreamDuplicator<Self>
    where
        Self: Sized + Send,
    {
        StreamDuplicator::with_max_offset_diff(self, max_offset_diff)
    }
}

impl<R> DuplicateExt for R where R: Read {}
