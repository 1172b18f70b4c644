//! A library for reading one byte stream with many independent readers.
//!
//! [`StreamDuplicator`] wraps any [`Read`](std::io::Read) source that can only be
//! consumed once and hands out [`DuplicatorReader`]s. Every reader sees the whole
//! stream from the beginning, at its own pace, while each byte is pulled from the
//! source exactly once.
//!
//! # Examples
//!
//! ```
//! use std::io::Read;
//! use stream_duplicator::StreamDuplicator;
//!
//! let source = &b"ABCDEFGHIJ"[..];
//! let (_duplicator, readers) = StreamDuplicator::with_readers(source, 2);
//!
//! // Every reader runs on its own thread
//! let handles: Vec<_> = readers
//!     .into_iter()
//!     .map(|mut reader| {
//!         std::thread::spawn(move || {
//!             let mut out = Vec::new();
//!             reader.read_to_end(&mut out).unwrap();
//!             out
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap(), b"ABCDEFGHIJ");
//! }
//! ```
//!
//! # Behavior
//!
//! When a reader asks for bytes nobody has pulled yet, it reads them from the
//! source itself and leaves a copy in a shared cache. Slower readers are served
//! from that cache. A chunk is evicted as soon as every open reader has moved
//! past it, so memory use follows the distance between the fastest and the
//! slowest reader.
//!
//! - Only one reader talks to the source at a time. Readers that need the bytes
//!   being fetched wait for that fetch instead of issuing their own.
//! - Readers start at offset 0. A reader added later can only catch up while the
//!   bytes it needs are still cached, otherwise it gets [`DuplicatorError::Evicted`].
//! - Closing (or dropping) a reader detaches it; it no longer keeps chunks alive.
//!
//! # Backpressure
//!
//! A duplicator can be created with a `max_offset_diff`. A reader that is that many
//! bytes ahead of the slowest open reader has its reads rejected with
//! [`DuplicatorError::BackpressureLimit`], without consuming anything. Reads that
//! would cross the limit are shortened. Rejected reads should be retried once the
//! other readers made progress; the duplicator never blocks on the limit.
//!
//! ```
//! use stream_duplicator::{DuplicatorError, DuplicatorOptions, StreamDuplicator};
//!
//! let options = DuplicatorOptions::new().with_max_offset_diff(4).with_readers(2);
//! let (_duplicator, mut readers) = StreamDuplicator::with_options(&b"ABCDEFGHIJ"[..], options);
//!
//! let mut buf = [0u8; 8];
//! let outcome = readers[0].read_outcome(&mut buf);
//! assert_eq!(&buf[..outcome.copied], b"ABCD");
//!
//! let outcome = readers[0].read_outcome(&mut buf);
//! assert_eq!(outcome.copied, 0);
//! assert!(matches!(outcome.error, Some(DuplicatorError::BackpressureLimit)));
//! ```
//!
//! # Errors
//!
//! [`DuplicatorReader::read_outcome`] returns the number of bytes copied together
//! with the error that stopped the read, so nothing already delivered is lost.
//! The [`Read`](std::io::Read) implementation maps end of stream to `Ok(0)` and
//! returns an error that follows a partial read on the next call.
//!
//! # Thread Safety
//!
//! `StreamDuplicator` and `DuplicatorReader` are both [`Send`] and [`Sync`] when
//! the source is [`Send`]. Reads are blocking, so in async code readers belong on
//! blocking threads (for example `tokio::task::spawn_blocking`).

#![cfg_attr(docsrs, feature(doc_cfg))]

mod cache;
mod duplicator;
mod error;
mod ext;
mod reader;
mod registry;
#[cfg(feature = "stats")]
mod stats;

pub use duplicator::{DuplicatorOptions, StreamDuplicator};
pub use error::{DuplicatorError, DuplicatorResult};
pub use ext::DuplicateExt;
pub use reader::{DuplicatorReader, ReadOutcome};
pub use registry::ReaderId;
#[cfg(feature = "stats")]
pub use stats::Stats;
