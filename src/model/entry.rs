//! Archive entry metadata.

use crate::codec::CompressionMethod;
use crate::crypto::{AES_METHOD, AesVendorVersion, EncryptionMethod, zipcrypto};
use crate::format::central::CentralDirectoryHeader;
use crate::format::extra::ExtraField;
use crate::format::{DOS_DIRECTORY_ATTRIBUTE, flags, version};
use crate::pipeline::DecodeParams;
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// Host system value for Unix in the "version made by" high byte.
const HOST_UNIX: u16 = 3;

/// One archive member, as recorded in the central directory.
///
/// Sizes and offsets are the true values; any ZIP64 relocation has already
/// been resolved. `local_header_offset` is relative to `disk_number` as
/// stored, which for anything but a PKWARE split archive is the absolute
/// offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Name, forward-slash separated. Directories end with `/`.
    pub name: String,
    /// Directory entry.
    pub is_directory: bool,
    /// Raw compression method of the plaintext (the real method for AES
    /// entries, not 99).
    pub compression_method: u16,
    /// Compression level used when the entry was written here.
    pub compression_level: Option<u32>,
    /// Encryption method.
    pub encryption: EncryptionMethod,
    /// AES vendor version, for AES entries.
    pub aes_version: Option<AesVendorVersion>,
    /// Plaintext size.
    pub uncompressed_size: u64,
    /// Stored size, encryption overhead included.
    pub compressed_size: u64,
    /// CRC-32 of the plaintext, or 0 for AE-2 entries.
    pub crc32: u32,
    /// Last modification time.
    pub last_modified: DosDateTime,
    /// Internal file attributes.
    pub internal_attributes: u16,
    /// External file attributes.
    pub external_attributes: u32,
    /// Offset of the Local File Header.
    pub local_header_offset: u64,
    /// Disk holding the Local File Header.
    pub disk_number: u32,
    /// At least one value needed ZIP64 relocation.
    pub zip64: bool,
    /// CRC and sizes follow the data in a Data Descriptor.
    pub data_descriptor: bool,
    /// Entry comment.
    pub comment: String,
    /// General purpose bit flags.
    pub flags: u16,
    /// "Version made by".
    pub version_made_by: u16,
    /// "Version needed to extract".
    pub version_needed: u16,
    pub(crate) raw_name: Vec<u8>,
    pub(crate) raw_comment: Vec<u8>,
    pub(crate) extra: ExtraField,
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl Entry {
    /// Creates a stored, unencrypted, empty entry called `name`.
    ///
    /// Mostly useful for building a [`ZipModel`](super::ZipModel) by hand;
    /// the writer fills entries in from what it actually wrote.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            is_directory: name.ends_with('/'),
            raw_name: name.as_bytes().to_vec(),
            name,
            compression_method: CompressionMethod::Store.id(),
            compression_level: None,
            encryption: EncryptionMethod::None,
            aes_version: None,
            uncompressed_size: 0,
            compressed_size: 0,
            crc32: 0,
            last_modified: DosDateTime::default(),
            internal_attributes: 0,
            external_attributes: 0,
            local_header_offset: 0,
            disk_number: 0,
            zip64: false,
            data_descriptor: false,
            comment: String::new(),
            flags: 0,
            version_made_by: version::MADE_BY,
            version_needed: version::DEFAULT,
            raw_comment: Vec::new(),
            extra: ExtraField::new(),
        }
    }

    /// Builds an entry from its decoded central directory header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptHeader`] if an AES entry lacks its extra
    /// record or method 99 appears without the encryption flag.
    pub fn from_central(header: CentralDirectoryHeader, offset: u64) -> Result<Self> {
        let encrypted = header.flags & flags::ENCRYPTED != 0;
        let (encryption, aes_version, compression_method) = if header.compression_method == AES_METHOD {
            let aes = header.extra.aes().ok_or_else(|| {
                Error::corrupt_header(offset, "AES method without AES extra field")
            })?;
            if !encrypted {
                return Err(Error::corrupt_header(
                    offset,
                    "AES method without the encryption flag",
                ));
            }
            (
                EncryptionMethod::Aes(aes.strength),
                Some(aes.vendor_version),
                aes.compression_method,
            )
        } else if encrypted {
            (EncryptionMethod::ZipCrypto, None, header.compression_method)
        } else {
            (EncryptionMethod::None, None, header.compression_method)
        };

        let zip64 = header.needs_zip64();
        let name = decode_text(&header.name);
        let is_directory =
            name.ends_with('/') || header.external_attributes & DOS_DIRECTORY_ATTRIBUTE != 0;
        Ok(Self {
            name,
            is_directory,
            compression_method,
            compression_level: None,
            encryption,
            aes_version,
            uncompressed_size: header.uncompressed_size,
            compressed_size: header.compressed_size,
            crc32: header.crc32,
            last_modified: header.last_modified,
            internal_attributes: header.internal_attributes,
            external_attributes: header.external_attributes,
            local_header_offset: header.local_header_offset,
            disk_number: header.disk_number,
            zip64,
            data_descriptor: header.flags & flags::DATA_DESCRIPTOR != 0,
            comment: decode_text(&header.comment),
            flags: header.flags,
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            raw_name: header.name,
            raw_comment: header.comment,
            extra: header.extra,
        })
    }

    /// Builds the central directory header for this entry.
    ///
    /// "Version needed" is raised to 4.5 when a value must be relocated.
    pub fn to_central(&self) -> CentralDirectoryHeader {
        let mut header = CentralDirectoryHeader {
            version_made_by: self.version_made_by,
            version_needed: self.version_needed,
            flags: self.flags,
            compression_method: self.stored_method(),
            last_modified: self.last_modified,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            disk_number: self.disk_number,
            internal_attributes: self.internal_attributes,
            external_attributes: self.external_attributes,
            local_header_offset: self.local_header_offset,
            name: self.raw_name.clone(),
            extra: self.extra.clone(),
            comment: self.raw_comment.clone(),
        };
        if header.needs_zip64() {
            header.version_needed = header.version_needed.max(version::ZIP64);
        }
        header
    }

    /// The method value written to headers: 99 for AES entries.
    pub fn stored_method(&self) -> u16 {
        match self.encryption {
            EncryptionMethod::Aes(_) => AES_METHOD,
            _ => self.compression_method,
        }
    }

    /// The compression method, if this build knows it.
    pub fn compression(&self) -> Option<CompressionMethod> {
        CompressionMethod::from_id(self.compression_method)
    }

    /// Returns true if the entry is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_encrypted()
    }

    /// Unix permission bits, if the entry was made on a Unix host.
    pub fn unix_permissions(&self) -> Option<u32> {
        (self.version_made_by >> 8 == HOST_UNIX && self.external_attributes >> 16 != 0)
            .then_some((self.external_attributes >> 16) & 0o7777)
    }

    /// Raw name bytes as stored.
    pub fn name_bytes(&self) -> &[u8] {
        &self.raw_name
    }

    /// Extra records other than ZIP64.
    pub fn extra_field(&self) -> &ExtraField {
        &self.extra
    }

    /// Parameters for the read pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] for an unknown compression
    /// method.
    pub fn decode_params(&self) -> Result<DecodeParams<'_>> {
        let compression = self.compression().ok_or(Error::UnsupportedMethod {
            method: self.compression_method,
        })?;
        let crc32 = match (self.encryption, self.aes_version) {
            (EncryptionMethod::Aes(_), Some(AesVendorVersion::Ae2)) => None,
            _ => Some(self.crc32),
        };
        Ok(DecodeParams {
            name: &self.name,
            compression,
            encryption: self.encryption,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            crc32,
            check_byte: zipcrypto::check_byte(
                self.crc32,
                self.last_modified.time(),
                self.data_descriptor,
            ),
            lzma_end_marker: self.flags & flags::COMPRESSION_OPTION_1 != 0,
        })
    }
}
