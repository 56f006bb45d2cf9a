//! Configuration and file naming for split archives.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Smallest split size accepted; PKWARE's lower bound for segments.
pub const MIN_SPLIT_SIZE: u64 = 64 * 1024;

/// File naming convention of a split archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SplitNaming {
    /// PKWARE spanning: `name.z01`, `name.z02`, ... and the last part keeps
    /// `name.zip`. Headers record real disk numbers and per-disk offsets,
    /// and the first part starts with the split marker.
    #[default]
    Pkware,
    /// Post-hoc splitting: `name.zip.001`, `name.zip.002`, ... The parts
    /// concatenate to an ordinary single-disk archive.
    Numbered,
}

/// Configuration for writing a split archive.
///
/// # Example
///
/// ```rust
/// use zipkit::volume::{SplitConfig, SplitNaming};
///
/// let config = SplitConfig::new(1024 * 1024).unwrap().naming(SplitNaming::Numbered);
/// assert_eq!(config.size(), 1024 * 1024);
/// assert!(SplitConfig::new(1000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
    size: u64,
    naming: SplitNaming,
}

impl SplitConfig {
    /// Creates a configuration with parts of at most `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if `size` is below [`MIN_SPLIT_SIZE`].
    pub fn new(size: u64) -> Result<Self> {
        if size < MIN_SPLIT_SIZE {
            return Err(Error::InvalidFormat(format!(
                "split size {} is below the minimum of {} bytes",
                size, MIN_SPLIT_SIZE
            )));
        }
        Ok(Self {
            size,
            naming: SplitNaming::default(),
        })
    }

    /// Sets the naming convention.
    pub fn naming(mut self, naming: SplitNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Maximum part size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The naming convention.
    pub fn split_naming(&self) -> SplitNaming {
        self.naming
    }
}

/// Path of a non-final PKWARE part: `disk` 0 is `.z01`.
pub fn pkware_part_path(archive: &Path, disk: u32) -> PathBuf {
    archive.with_extension(format!("z{:02}", disk + 1))
}

/// Path of a numbered part: `disk` 0 is `.001`.
pub fn numbered_part_path(archive: &Path, disk: u32) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(format!(".{:03}", disk + 1));
    PathBuf::from(name)
}

/// Path of any part under `naming`.
///
/// For PKWARE naming the final part is the archive path itself.
pub fn part_path(archive: &Path, naming: SplitNaming, disk: u32, last: bool) -> PathBuf {
    match naming {
        SplitNaming::Pkware if last => archive.to_path_buf(),
        SplitNaming::Pkware => pkware_part_path(archive, disk),
        SplitNaming::Numbered => numbered_part_path(archive, disk),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkware_names() {
        let base = Path::new("/tmp/backup.zip");
        assert_eq!(pkware_part_path(base, 0), PathBuf::from("/tmp/backup.z01"));
        assert_eq!(pkware_part_path(base, 9), PathBuf::from("/tmp/backup.z10"));
        assert_eq!(pkware_part_path(base, 99), PathBuf::from("/tmp/backup.z100"));
        assert_eq!(
            part_path(base, SplitNaming::Pkware, 3, true),
            PathBuf::from("/tmp/backup.zip")
        );
    }

    #[test]
    fn test_numbered_names() {
        let base = Path::new("data.zip");
        assert_eq!(numbered_part_path(base, 0), PathBuf::from("data.zip.001"));
        assert_eq!(numbered_part_path(base, 41), PathBuf::from("data.zip.042"));
        assert_eq!(
            part_path(base, SplitNaming::Numbered, 2, true),
            PathBuf::from("data.zip.003")
        );
    }

    #[test]
    fn test_minimum_size() {
        assert!(SplitConfig::new(MIN_SPLIT_SIZE).is_ok());
        assert!(matches!(
            SplitConfig::new(MIN_SPLIT_SIZE - 1),
            Err(Error::InvalidFormat(_))
        ));
        let config = SplitConfig::new(MIN_SPLIT_SIZE).unwrap();
        assert_eq!(config.split_naming(), SplitNaming::Pkware);
    }
}
