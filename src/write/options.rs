//! Write options and configuration for archive creation.

use crate::codec::{CompressionMethod, DEFAULT_LEVEL};
use crate::crypto::{EncryptionMethod, Password};
use crate::timestamp::DosDateTime;
use crate::volume::SplitConfig;
use crate::{Error, Result};

/// Archive-level options.
///
/// # Example
///
/// ```rust
/// use zipkit::WriteOptions;
///
/// let options = WriteOptions::new().zip64(true).comment("nightly build");
/// assert!(options.zip64);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Always write the ZIP64 trailer, even when nothing overflows.
    pub zip64: bool,
    /// Archive comment. Truncated to 65535 bytes on write.
    pub comment: Option<String>,
    /// Split the archive into parts, for
    /// [`Writer::create_with_options`](super::Writer::create_with_options).
    pub split: Option<SplitConfig>,
}

impl WriteOptions {
    /// Creates new write options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces ZIP64 trailers.
    pub fn zip64(mut self, enabled: bool) -> Self {
        self.zip64 = enabled;
        self
    }

    /// Sets an archive comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Writes a split archive.
    pub fn split(mut self, config: SplitConfig) -> Self {
        self.split = Some(config);
        self
    }
}

/// Per-entry options.
///
/// The default is Deflate at level 6, unencrypted, timestamped with the
/// current time.
///
/// # Example
///
/// ```rust
/// use zipkit::{CompressionMethod, EntryOptions};
///
/// let opts = EntryOptions::new()
///     .compression(CompressionMethod::Store)
///     .level(9)?;
/// assert_eq!(opts.level, 9);
/// assert!(EntryOptions::new().level(15).is_err());
/// # Ok::<(), zipkit::Error>(())
/// ```
#[derive(Clone)]
pub struct EntryOptions {
    /// Compression method.
    pub compression: CompressionMethod,
    /// Compression level (0-9).
    pub level: u32,
    /// Encryption method.
    pub encryption: EncryptionMethod,
    /// Password, required when `encryption` is not `None`.
    pub password: Option<Password>,
    /// Modification time; `None` means now.
    pub last_modified: Option<DosDateTime>,
    /// Entry comment.
    pub comment: Option<String>,
    /// Unix permission bits, stored in the high half of the external
    /// attributes.
    pub unix_permissions: Option<u32>,
    /// Expected plaintext size of a streamed entry.
    pub size_hint: Option<u64>,
    /// Reserve ZIP64 fields in the local header so the entry may grow past
    /// 4 GiB. Implied by a `size_hint` at or above that.
    pub large_file: bool,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::default(),
            level: DEFAULT_LEVEL,
            encryption: EncryptionMethod::None,
            password: None,
            last_modified: None,
            comment: None,
            unix_permissions: None,
            size_hint: None,
            large_file: false,
        }
    }
}

impl std::fmt::Debug for EntryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryOptions")
            .field("compression", &self.compression)
            .field("level", &self.level)
            .field("encryption", &self.encryption)
            .field("has_password", &self.password.is_some())
            .field("last_modified", &self.last_modified)
            .field("size_hint", &self.size_hint)
            .field("large_file", &self.large_file)
            .finish()
    }
}

impl EntryOptions {
    /// Creates new entry options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression method.
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    /// Sets the compression level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCompressionLevel`] if level is greater than 9.
    pub fn level(mut self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidCompressionLevel {
                method: self.compression.id(),
                level,
            });
        }
        self.level = level;
        Ok(self)
    }

    /// Sets the encryption method.
    pub fn encryption(mut self, method: EncryptionMethod) -> Self {
        self.encryption = method;
        self
    }

    /// Sets the password for encryption.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the modification time.
    pub fn last_modified(mut self, time: DosDateTime) -> Self {
        self.last_modified = Some(time);
        self
    }

    /// Sets the entry comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets Unix permission bits.
    pub fn unix_permissions(mut self, mode: u32) -> Self {
        self.unix_permissions = Some(mode & 0o7777);
        self
    }

    /// Declares the expected plaintext size.
    pub fn size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    /// Reserves ZIP64 fields for entries that may exceed 4 GiB.
    pub fn large_file(mut self, enabled: bool) -> Self {
        self.large_file = enabled;
        self
    }

    pub(crate) fn reserves_zip64(&self) -> bool {
        self.large_file
            || self
                .size_hint
                .is_some_and(crate::format::zip64::exceeds_u32)
    }
}

/// Result of writing an archive.
#[must_use = "write results should be checked to ensure archive was created successfully"]
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    /// Number of file entries written.
    pub entries_written: usize,
    /// Number of directories written.
    pub directories_written: usize,
    /// Total uncompressed bytes.
    pub total_size: u64,
    /// Total compressed bytes.
    pub compressed_size: u64,
    /// Size of the whole archive in bytes.
    pub archive_size: u64,
    /// The archive has a ZIP64 trailer.
    pub zip64: bool,
    /// Number of volumes written (1 for single-file archives).
    pub volume_count: u32,
}

impl WriteResult {
    /// Returns the compression ratio (compressed / uncompressed).
    pub fn compression_ratio(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.total_size as f64
        }
    }

    /// Returns the space savings fraction.
    pub fn space_savings(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            1.0 - self.compression_ratio()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_options_default() {
        let opts = EntryOptions::default();
        assert_eq!(opts.compression, CompressionMethod::Deflate);
        assert_eq!(opts.level, DEFAULT_LEVEL);
        assert_eq!(opts.encryption, EncryptionMethod::None);
        assert!(!opts.reserves_zip64());
    }

    #[test]
    fn test_level_valid() {
        for level in 0..=9 {
            assert_eq!(EntryOptions::new().level(level).unwrap().level, level);
        }
    }

    #[test]
    fn test_level_invalid() {
        let err = EntryOptions::new()
            .compression(CompressionMethod::Store)
            .level(10)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidCompressionLevel { method: 0, level: 10 }
        ));
    }

    #[test]
    fn test_size_hint_reserves_zip64() {
        assert!(EntryOptions::new().size_hint(u32::MAX as u64).reserves_zip64());
        assert!(!EntryOptions::new().size_hint(1024).reserves_zip64());
        assert!(EntryOptions::new().large_file(true).reserves_zip64());
    }

    #[test]
    fn test_debug_hides_password() {
        let opts = EntryOptions::new().password("hunter2");
        let debug = format!("{:?}", opts);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("has_password: true"));
    }

    #[test]
    fn test_result_ratio() {
        let result = WriteResult {
            total_size: 100,
            compressed_size: 25,
            ..Default::default()
        };
        assert!((result.space_savings() - 0.75).abs() < f64::EPSILON);
    }
}
