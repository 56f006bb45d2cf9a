//! # zipkit
//!
//! A pure-Rust engine for reading and writing ZIP archives.
//!
//! The crate covers the container format end to end: local and central
//! headers, ZIP64 for entries and archives past the 32-bit limits, split
//! archives in both PKWARE (`.z01` ... `.zip`) and numbered (`.001` ...)
//! layouts, and a per-entry pipeline of compression (Store, Deflate, BZip2,
//! LZMA, Zstandard) and encryption (PKWARE ZipCrypto, WinZip AES).
//!
//! ## Quick Start
//!
//! ### Creating an Archive
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipkit::{CompressionMethod, EntryOptions, Result, Writer};
//!
//! fn main() -> Result<()> {
//!     let mut writer = Writer::create_path("new.zip")?;
//!
//!     // Data already in memory: sizes go straight into the local header.
//!     writer.add_bytes("hello.txt", b"Hello, World!", &EntryOptions::default())?;
//!
//!     // Streamed data: sizes are patched in or follow in a Data Descriptor.
//!     let opts = EntryOptions::new().compression(CompressionMethod::Zstd);
//!     writer.start_entry("log.txt", &opts)?;
//!     writer.write_all(b"line one\nline two\n")?;
//!     writer.close_entry()?;
//!
//!     let result = writer.finish()?;
//!     println!("wrote {} entries, {} bytes", result.entries_written, result.archive_size);
//!     Ok(())
//! }
//! ```
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use zipkit::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::open_path("archive.zip")?;
//!     for entry in archive.entries() {
//!         println!("{}: {} bytes", entry.name, entry.uncompressed_size);
//!     }
//!     let data = archive.extract_to_vec("hello.txt")?;
//!     assert_eq!(data, b"Hello, World!");
//!     Ok(())
//! }
//! ```
//!
//! ### Encryption
//!
//! ```rust,ignore
//! # #[cfg(feature = "aes")]
//! use zipkit::{AesStrength, Archive, EncryptionMethod, EntryOptions, Password, Writer};
//!
//! let opts = EntryOptions::new()
//!     .encryption(EncryptionMethod::Aes(AesStrength::Aes256))
//!     .password(Password::new("secret"));
//! let mut writer = Writer::create_path("secret.zip")?;
//! writer.add_bytes("plan.txt", b"attack at dawn", &opts)?;
//! writer.finish()?;
//!
//! let mut archive = Archive::open_path("secret.zip")?;
//! archive.set_password(Password::new("secret"));
//! let plain = archive.extract_to_vec("plan.txt")?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression (method 8) |
//! | `bzip2` | Yes | BZip2 compression (method 12) |
//! | `lzma` | Yes | LZMA compression (method 14) |
//! | `zstd` | Yes | Zstandard compression (method 93) |
//! | `aes` | Yes | WinZip AES encryption (AE-1 and AE-2) |
//!
//! Store and ZipCrypto are always available. A method whose feature is
//! disabled fails with [`Error::UnsupportedMethod`].
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod edit;
pub mod error;
pub mod format;
pub mod model;
pub mod pipeline;
pub mod read;
pub mod timestamp;
pub mod volume;
pub mod write;

pub use error::{Error, PasswordDetectionMethod, Result, map_io_error};
pub use timestamp::DosDateTime;

pub use codec::CompressionMethod;
pub use crypto::{AesStrength, EncryptionMethod, Password};

pub use model::{Entry, ZipModel};

// Re-export reading API at crate root for convenience
pub use read::{Archive, EntryReader};

// Re-export writing API at crate root for convenience
pub use write::{EntryOptions, WriteOptions, WriteResult, Writer};

// Re-export volume API at crate root for convenience
pub use volume::{SplitConfig, SplitNaming};

// Re-export edit API
pub use edit::{EditResult, remove_entries};
