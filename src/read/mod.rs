//! Archive reading API.
//!
//! Opening an archive scans backward for the End-of-Central-Directory
//! record, follows the ZIP64 locator when there is one, and parses the
//! central directory into a [`ZipModel`]. Entry data is only touched on
//! extraction.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipkit::Archive;
//!
//! let mut archive = Archive::open_path("archive.zip")?;
//!
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.name, entry.uncompressed_size);
//! }
//!
//! let data = archive.extract_to_vec("readme.txt")?;
//! # Ok::<(), zipkit::Error>(())
//! ```
//!
//! Split archives are opened through any of their parts' names as long as
//! the siblings are present; see [`volume`](crate::volume).

mod archive_open;
mod archive_query;
mod extraction;

pub use extraction::EntryReader;

use crate::crypto::Password;
use crate::model::ZipModel;
use crate::volume::{DiskTable, SplitNaming};

/// A ZIP archive reader.
///
/// `R` is the byte source: any `Read + Seek` for [`Archive::open`], or a
/// [`UnifiedReader`](crate::volume::UnifiedReader) for
/// [`Archive::open_path`], which also handles split archives.
pub struct Archive<R> {
    pub(crate) reader: R,
    pub(crate) model: ZipModel,
    /// Physical files, empty when opened from a plain reader.
    pub(crate) table: DiskTable,
    /// Naming convention of a split archive.
    pub(crate) naming: Option<SplitNaming>,
    /// Default password for encrypted entries.
    pub(crate) password: Option<Password>,
}

impl<R> Archive<R> {
    /// Maps a `(disk, offset)` pair as recorded in a header to a position
    /// in the reader.
    ///
    /// Only PKWARE split archives record per-disk offsets; everything else
    /// records absolute offsets on disk 0.
    pub(crate) fn resolve(&self, disk: u32, offset: u64) -> crate::Result<u64> {
        resolve_in(self.naming, &self.table, disk, offset)
    }
}

pub(crate) fn resolve_in(
    naming: Option<SplitNaming>,
    table: &DiskTable,
    disk: u32,
    offset: u64,
) -> crate::Result<u64> {
    match naming {
        Some(SplitNaming::Pkware) => table.absolute(disk, offset),
        _ => Ok(offset),
    }
}

impl<R> std::fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.model.len())
            .field("zip64", &self.model.zip64)
            .field("disks", &self.table.len())
            .field("naming", &self.naming)
            .field("has_password", &self.password.is_some())
            .finish()
    }
}
