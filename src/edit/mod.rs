//! Archive editing.
//!
//! Entries are removed by rewriting the archive: the kept entries' records
//! are copied byte for byte into a temporary file next to the original,
//! a fresh central directory is written for them, and the temporary file
//! is renamed over the original. Entry data is never decompressed, so
//! encrypted entries can be kept without a password.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipkit::edit::remove_entries;
//!
//! let result = remove_entries("archive.zip", &["old.log", "tmp/"])?;
//! println!(
//!     "removed {}, kept {}, {} bytes reclaimed",
//!     result.entries_removed,
//!     result.entries_kept,
//!     result.bytes_reclaimed()
//! );
//! # Ok::<(), zipkit::Error>(())
//! ```

mod remove;

pub use remove::{EditResult, remove_entries};
