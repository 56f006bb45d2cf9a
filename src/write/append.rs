//! Appending entries to an existing archive in place.
//!
//! The new entries overwrite the old central directory; existing entry data
//! is not touched. On finish a merged central directory is written and the
//! file is cut to its new length.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipkit::{EntryOptions, Writer};
//!
//! let mut writer = Writer::append_path("archive.zip")?;
//! writer.add_bytes("new_file.txt", b"Hello, World!", &EntryOptions::default())?;
//! let result = writer.finish()?;
//! println!("{} entries in total", result.entries_written);
//! # Ok::<(), zipkit::Error>(())
//! ```

use std::path::Path;

use crate::read::Archive;
use crate::volume::FileVolume;
use crate::write::{WriteOptions, Writer};
use crate::{Error, Result};

impl Writer<FileVolume> {
    /// Opens an existing single-file archive for appending.
    ///
    /// The archive comment is kept unless
    /// [`WriteOptions::comment`] replaces it; a ZIP64 trailer stays ZIP64.
    /// A digital signature record is dropped, since it no longer matches.
    ///
    /// # Errors
    ///
    /// - Any error from [`Archive::open_path`].
    /// - [`Error::UnsupportedFeature`] for split archives.
    pub fn append_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let archive = Archive::open_path(path)?;
        if archive.is_split() {
            return Err(Error::UnsupportedFeature {
                feature: "appending to a split archive",
            });
        }
        let mut model = archive.into_model();
        model.digital_signature = None;
        let offset = model.cd_offset;
        let zip64 = model.zip64;
        log::debug!(
            "appending to {} after {} entries at offset {}",
            path.display(),
            model.len(),
            offset
        );

        let sink = FileVolume::open_at(path, offset)?;
        Ok(Self::with_model(sink, model, offset).options(WriteOptions::new().zip64(zip64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionMethod;
    use crate::write::EntryOptions;
    use tempfile::TempDir;

    #[test]
    fn test_append_keeps_existing_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");

        let mut writer = Writer::create_with_options(&path, WriteOptions::new().comment("keep me"))
            .unwrap();
        writer
            .add_bytes("one.txt", b"first", &EntryOptions::default())
            .unwrap();
        writer.finish().unwrap();

        let mut writer = Writer::append_path(&path).unwrap();
        let opts = EntryOptions::new().compression(CompressionMethod::Store);
        writer.add_bytes("two.txt", b"second", &opts).unwrap();
        assert!(matches!(
            writer.add_bytes("one.txt", b"again", &opts),
            Err(Error::EntryExists { .. })
        ));
        let result = writer.finish().unwrap();
        assert_eq!(result.entries_written, 2);
        assert_eq!(result.archive_size, std::fs::metadata(&path).unwrap().len());

        let mut archive = Archive::open_path(&path).unwrap();
        assert_eq!(archive.comment(), b"keep me");
        assert_eq!(archive.extract_to_vec("one.txt").unwrap(), b"first");
        assert_eq!(archive.extract_to_vec("two.txt").unwrap(), b"second");
    }

    #[test]
    fn test_append_with_nothing_new_is_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("same.zip");
        let mut writer = Writer::create_path(&path).unwrap();
        writer
            .add_bytes("x", b"payload", &EntryOptions::default())
            .unwrap();
        writer.finish().unwrap();
        let before = std::fs::read(&path).unwrap();

        Writer::append_path(&path).unwrap().finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
