//! Error types for ZIP archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when reading, writing or editing ZIP archives, along with a
//! convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`:
//!
//! ```rust,no_run
//! use zipkit::{Archive, Error};
//!
//! fn read_entry(path: &str, name: &str) -> zipkit::Result<Vec<u8>> {
//!     let mut archive = Archive::open_path(path)?;
//!     match archive.extract_to_vec(name) {
//!         Err(Error::WrongPassword { .. }) => {
//!             eprintln!("{name} is encrypted with a different password");
//!             Err(Error::PasswordRequired { entry_name: name.to_string() })
//!         }
//!         Err(Error::VolumeMissing { path, .. }) => {
//!             eprintln!("split archive is missing {path}");
//!             Err(Error::InvalidFormat("incomplete split set".into()))
//!         }
//!         other => other,
//!     }
//! }
//! ```

use std::io;

/// How a wrong password was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PasswordDetectionMethod {
    /// The password verification bytes stored ahead of the ciphertext did not
    /// match (PKWARE check byte or AES 2-byte verifier).
    VerificationBytes,

    /// The AES HMAC-SHA1 authentication code did not match the ciphertext.
    AuthenticationCode,

    /// Detected after decryption via CRC-32 mismatch.
    ///
    /// Only used for PKWARE-encrypted entries, whose single check byte lets
    /// roughly one wrong password in 256 through.
    CrcMismatch,

    /// The decrypted data caused the decompressor to fail.
    DecompressionFailure,
}

impl std::fmt::Display for PasswordDetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VerificationBytes => write!(f, "password verification bytes"),
            Self::AuthenticationCode => write!(f, "authentication code mismatch"),
            Self::CrcMismatch => write!(f, "CRC mismatch after decryption"),
            Self::DecompressionFailure => write!(f, "decompression failure"),
        }
    }
}

/// Renders a record signature the way it appears in a hex dump (`PK\x03\x04`).
struct SignatureDisplay(u32);

impl std::fmt::Display for SignatureDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0.to_le_bytes() {
            if byte.is_ascii_alphanumeric() {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

/// The main error type for ZIP archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system operations |
/// | Format | [`SignatureMismatch`][Self::SignatureMismatch], [`CorruptHeader`][Self::CorruptHeader], [`InvalidFormat`][Self::InvalidFormat] | Damaged or non-ZIP input |
/// | Volumes | [`VolumeMissing`][Self::VolumeMissing] | Incomplete split set |
/// | Security | [`WrongPassword`][Self::WrongPassword], [`PasswordRequired`][Self::PasswordRequired] | Encrypted entries |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch] | Data corruption |
/// | Usage | [`EntryExists`][Self::EntryExists], [`EntryInProgress`][Self::EntryInProgress], [`InvariantViolation`][Self::InvariantViolation] | Caller or engine defects |
/// | Compatibility | [`UnsupportedMethod`][Self::UnsupportedMethod], [`UnsupportedFeature`][Self::UnsupportedFeature] | Missing features |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record did not start with the expected 4-byte signature.
    #[error(
        "Signature mismatch at offset {offset:#x}: expected {}, found {}",
        SignatureDisplay(*expected),
        SignatureDisplay(*found)
    )]
    SignatureMismatch {
        /// The signature the record type requires.
        expected: u32,
        /// The four bytes actually found.
        found: u32,
        /// Absolute archive offset of the record.
        offset: u64,
    },

    /// A record is truncated or one of its length fields is inconsistent.
    #[error("Corrupt header at offset {offset:#x}: {reason}")]
    CorruptHeader {
        /// The byte offset where corruption was detected.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// The input is not a ZIP archive or its trailer is inconsistent.
    #[error("Invalid ZIP format: {0}")]
    InvalidFormat(String),

    /// A required volume file is missing from a split archive.
    #[error("Missing volume {volume}: {path}")]
    VolumeMissing {
        /// The 1-based volume number that is missing.
        volume: u32,
        /// The expected path of the missing volume.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The password is incorrect for an encrypted entry.
    #[error("Wrong password for entry '{entry_name}' ({detection_method})")]
    WrongPassword {
        /// The entry the password was rejected for.
        entry_name: String,
        /// How the wrong password was detected.
        detection_method: PasswordDetectionMethod,
    },

    /// An encrypted entry was opened without any password.
    #[error("Password required for entry '{entry_name}'")]
    PasswordRequired {
        /// The encrypted entry.
        entry_name: String,
    },

    /// A cryptographic primitive failed (bad key length, RNG failure).
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// The CRC checksum of extracted data does not match the stored value.
    #[error("CRC mismatch for entry '{entry_name}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The entry with the CRC mismatch.
        entry_name: String,
        /// The expected CRC value from the archive.
        expected: u32,
        /// The actual CRC value of the extracted data.
        actual: u32,
    },

    /// An entry with this name already exists in the archive.
    #[error("Entry already exists: {name}")]
    EntryExists {
        /// The duplicate name.
        name: String,
    },

    /// No entry with this name exists in the archive.
    #[error("Entry not found: {name}")]
    EntryNotFound {
        /// The requested name.
        name: String,
    },

    /// A new entry was started while another entry's stream is still open.
    #[error("Entry '{name}' is still open; close it before starting another")]
    EntryInProgress {
        /// The entry that is still open.
        name: String,
    },

    /// Entry data was written, or an entry was closed, with no entry open.
    #[error("No entry is open")]
    NoEntryInProgress,

    /// Internal bookkeeping disagrees with what was actually written.
    ///
    /// This indicates a defect in the engine, not a problem with the input.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The archive uses a compression or encryption method not supported by
    /// this build.
    #[error("Unsupported method: {method}")]
    UnsupportedMethod {
        /// The raw ZIP method number.
        method: u16,
    },

    /// A feature required by the operation is not supported.
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// The requested compression level is outside the accepted range.
    #[error("Invalid compression level {level} for method {method} (expected 0-9)")]
    InvalidCompressionLevel {
        /// The raw ZIP method number.
        method: u16,
        /// The rejected level.
        level: u32,
    },
}

impl Error {
    /// Returns true if this error indicates damaged archive data.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::SignatureMismatch { .. }
                | Error::CorruptHeader { .. }
                | Error::InvalidFormat(_)
                | Error::CrcMismatch { .. }
        )
    }

    /// Returns true if this error is password related.
    pub fn is_encryption_error(&self) -> bool {
        matches!(
            self,
            Error::WrongPassword { .. } | Error::PasswordRequired { .. } | Error::CryptoError(_)
        )
    }

    /// Returns the entry name associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::WrongPassword { entry_name, .. }
            | Error::PasswordRequired { entry_name }
            | Error::CrcMismatch { entry_name, .. } => Some(entry_name),
            Error::EntryExists { name }
            | Error::EntryNotFound { name }
            | Error::EntryInProgress { name } => Some(name),
            _ => None,
        }
    }

    /// Creates a corrupt header error.
    pub fn corrupt_header(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptHeader {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a wrong password error.
    pub fn wrong_password(
        entry_name: impl Into<String>,
        detection_method: PasswordDetectionMethod,
    ) -> Self {
        Error::WrongPassword {
            entry_name: entry_name.into(),
            detection_method,
        }
    }

    /// Creates an invariant violation and logs it.
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("{}", message);
        Error::InvariantViolation(message)
    }
}

/// Converts an I/O error back into a crate error.
///
/// Streaming adapters (entry readers and writers) can only report
/// `std::io::Error`; they tunnel crate errors through it with
/// [`io::Error::other`]. This recovers the original variant.
pub fn map_io_error(err: io::Error) -> Error {
    if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        if let Some(inner) = err.into_inner() {
            if let Ok(error) = inner.downcast::<Error>() {
                return *error;
            }
        }
        return Error::InvalidFormat("unrecoverable tunnelled error".into());
    }
    Error::Io(err)
}

/// Result type alias for ZIP operations.
pub type Result<T> = std::result::Result<T, Error>;
