//! Random access into gzip and zlib streams.
//!
//! A single sequential pass ([`build_index`]) records access points where
//! decoding can restart, each paired with the 32 KiB of output preceding
//! it. [`extract`] then serves reads at arbitrary uncompressed offsets by
//! resuming from the nearest point. The index persists to two side files
//! ([`write_index`] / [`read_index`]) and [`IndexedStream`] wraps all of it
//! in a read/seek/tell handle.

pub mod codec;
pub mod error;
pub mod extract;
pub mod index;
mod inflate;
pub mod stream;
pub mod window;

pub use codec::{read_index, write_index, RECORD_LEN};
pub use error::{Error, Result};
pub use extract::{extract, locate};
pub use index::{build_index, AccessPoint, Index, IndexBuilder, IndexConfig, CHUNK_SIZE, DEFAULT_SPAN};
pub use stream::{IndexPaths, IndexedStream, SeekOutcome, Whence};
pub use window::{ResidentWindows, Window, WindowFile, WindowSource, WINDOW_SIZE};
