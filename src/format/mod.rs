//! ZIP format constants and the binary header codec.
//!
//! This module contains the record signatures, fixed record sizes, flag bits
//! and version numbers defined by the PKWARE APPNOTE, plus the codecs for
//! every on-disk record:
//!
//! - [`local`]: Local File Header and Data Descriptor
//! - [`central`]: Central Directory File Header and Digital Signature
//! - [`trailer`]: End-of-Central-Directory, its ZIP64 variant and locator
//! - [`extra`]: Extra Field sub-records
//! - [`zip64`]: the overflow resolver shared by all of the above

pub mod central;
pub mod extra;
pub mod local;
pub mod reader;
pub mod trailer;
pub mod zip64;

/// Local File Header signature, `PK\x03\x04`.
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;

/// Central Directory File Header signature, `PK\x01\x02`.
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;

/// Data Descriptor signature, `PK\x07\x08`.
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

/// First four bytes of the first volume of a PKWARE split archive.
///
/// Shares its value with [`DATA_DESCRIPTOR_SIGNATURE`].
pub const SPLIT_ARCHIVE_MARKER: u32 = DATA_DESCRIPTOR_SIGNATURE;

/// Replaces [`SPLIT_ARCHIVE_MARKER`] when a split archive fits on one
/// volume, `PK00`.
pub const SINGLE_SEGMENT_MARKER: u32 = 0x3030_4b50;

/// Digital Signature record signature, `PK\x05\x05`.
pub const DIGITAL_SIGNATURE_SIGNATURE: u32 = 0x0505_4b50;

/// End-of-Central-Directory signature, `PK\x05\x06`.
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;

/// ZIP64 End-of-Central-Directory signature, `PK\x06\x06`.
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;

/// ZIP64 End-of-Central-Directory Locator signature, `PK\x06\x07`.
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;

/// Fixed part of a Local File Header.
pub const LOCAL_FILE_HEADER_SIZE: u64 = 30;

/// Fixed part of a Central Directory File Header.
pub const CENTRAL_DIRECTORY_HEADER_SIZE: u64 = 46;

/// Fixed part of the End-of-Central-Directory record.
pub const EOCD_SIZE: u64 = 22;

/// Fixed part of the ZIP64 End-of-Central-Directory record.
pub const ZIP64_EOCD_SIZE: u64 = 56;

/// Size of the ZIP64 End-of-Central-Directory Locator.
pub const ZIP64_LOCATOR_SIZE: u64 = 20;

/// Longest archive, entry or file comment the 16-bit length fields allow.
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// General purpose bit flags.
pub mod flags {
    /// Entry data is encrypted.
    pub const ENCRYPTED: u16 = 1 << 0;
    /// Compression option bit 1 (Deflate level hint, LZMA end marker).
    pub const COMPRESSION_OPTION_1: u16 = 1 << 1;
    /// Compression option bit 2 (Deflate level hint).
    pub const COMPRESSION_OPTION_2: u16 = 1 << 2;
    /// CRC and sizes follow the data in a Data Descriptor.
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
    /// Name and comment are UTF-8.
    pub const UTF8: u16 = 1 << 11;
}

/// "Version needed to extract" values, as `major * 10 + minor`.
pub mod version {
    /// Baseline: Deflate, folders, PKWARE encryption.
    pub const DEFAULT: u16 = 20;
    /// ZIP64 extensions.
    pub const ZIP64: u16 = 45;
    /// BZIP2 compression.
    pub const BZIP2: u16 = 46;
    /// WinZip AES encryption.
    pub const AES: u16 = 51;
    /// LZMA and Zstandard compression.
    pub const LZMA: u16 = 63;
    /// "Version made by": Unix host (3) with APPNOTE 6.3.
    pub const MADE_BY: u16 = (3 << 8) | 63;
}

/// MS-DOS directory attribute in the low byte of the external attributes.
pub const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;
