//! Per-entry header builder.
//!
//! An [`EntryPlan`] is fixed when an entry starts. Every header the entry
//! needs (the initial local header, its patched replacement, the data
//! descriptor and the final [`Entry`]) is derived from the plan plus the
//! [`Measured`] values, so no stage ever mutates a shared header.

use crate::codec::CompressionMethod;
use crate::crypto::{AES_METHOD, AesVendorVersion, EncryptionMethod, Password, zipcrypto};
use crate::format::central::CentralDirectoryHeader;
use crate::format::extra::{AesExtraData, ExtraField};
use crate::format::local::{DataDescriptor, LocalFileHeader};
use crate::format::zip64::{SizeField, exceeds_u32};
use crate::format::{DOS_DIRECTORY_ATTRIBUTE, MAX_COMMENT_LEN, flags, version};
use crate::model::Entry;
use crate::pipeline::Encryption;
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

use super::options::EntryOptions;

const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

/// How the entry's CRC and sizes reach the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SizeDelivery {
    /// Known before the local header is written.
    Known,
    /// Placeholders now, overwritten in place after the data.
    Patched,
    /// Zeros now, a Data Descriptor after the data.
    Descriptor,
}

/// Values measured while the entry's data went through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Measured {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// Where the local header landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderPosition {
    /// Absolute position.
    pub absolute: u64,
    /// Disk number to record.
    pub disk: u32,
    /// Offset to record.
    pub disk_offset: u64,
}

/// Everything about an entry that is decided before its data is written.
#[derive(Debug, Clone)]
pub(crate) struct EntryPlan {
    pub name: String,
    pub compression: CompressionMethod,
    pub level: u32,
    pub encryption: EncryptionMethod,
    password: Option<Password>,
    pub delivery: SizeDelivery,
    pub reserve_zip64: bool,
    pub is_directory: bool,
    last_modified: DosDateTime,
    external_attributes: u32,
    comment: Vec<u8>,
    flags: u16,
    version_needed: u16,
}

fn deflate_level_flags(level: u32) -> u16 {
    match level {
        0 | 1 => flags::COMPRESSION_OPTION_1 | flags::COMPRESSION_OPTION_2,
        2 => flags::COMPRESSION_OPTION_2,
        8 | 9 => flags::COMPRESSION_OPTION_1,
        _ => 0,
    }
}

impl EntryPlan {
    /// Validates `options` and fixes the entry's layout.
    ///
    /// Sizes are delivered as [`SizeDelivery::Known`] until
    /// [`with_delivery`](Self::with_delivery) says otherwise.
    ///
    /// Fails before anything is written if the method is unsupported, the
    /// level is out of range or an encrypted entry has no password.
    pub fn new(name: String, options: &EntryOptions, is_directory: bool, reserve_zip64: bool) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidFormat("entry name must not be empty".into()));
        }
        if name.len() > u16::MAX as usize {
            return Err(Error::InvalidFormat(format!(
                "entry name is {} bytes, the limit is 65535",
                name.len()
            )));
        }
        let comment = options.comment.clone().unwrap_or_default().into_bytes();
        if comment.len() > MAX_COMMENT_LEN {
            return Err(Error::InvalidFormat(format!(
                "comment of '{}' is {} bytes, the limit is 65535",
                name,
                comment.len()
            )));
        }
        options.compression.ensure_supported()?;
        options.encryption.ensure_supported()?;
        if options.level > 9 {
            return Err(Error::InvalidCompressionLevel {
                method: options.compression.id(),
                level: options.level,
            });
        }
        let password = if options.encryption.is_encrypted() {
            Some(options.password.clone().ok_or_else(|| Error::PasswordRequired {
                entry_name: name.clone(),
            })?)
        } else {
            None
        };

        let mut gp_flags = 0u16;
        if !name.is_ascii() || !comment.is_ascii() {
            gp_flags |= flags::UTF8;
        }
        if options.encryption.is_encrypted() {
            gp_flags |= flags::ENCRYPTED;
        }
        match options.compression {
            CompressionMethod::Lzma => gp_flags |= flags::COMPRESSION_OPTION_1,
            CompressionMethod::Deflate => gp_flags |= deflate_level_flags(options.level),
            _ => {}
        }

        let mut version_needed = options.compression.version_needed().max(version::DEFAULT);
        if reserve_zip64 {
            version_needed = version_needed.max(version::ZIP64);
        }
        if matches!(options.encryption, EncryptionMethod::Aes(_)) {
            version_needed = version_needed.max(version::AES);
        }

        let external_attributes = if is_directory {
            ((S_IFDIR | options.unix_permissions.unwrap_or(DEFAULT_DIR_MODE)) << 16)
                | DOS_DIRECTORY_ATTRIBUTE
        } else {
            (S_IFREG | options.unix_permissions.unwrap_or(DEFAULT_FILE_MODE)) << 16
        };

        Ok(Self {
            name,
            compression: options.compression,
            level: options.level,
            encryption: options.encryption,
            password,
            delivery: SizeDelivery::Known,
            reserve_zip64,
            is_directory,
            last_modified: options.last_modified.unwrap_or_else(DosDateTime::now),
            external_attributes,
            comment,
            flags: gp_flags,
            version_needed,
        })
    }

    /// Chooses how CRC and sizes reach the archive.
    pub fn with_delivery(mut self, delivery: SizeDelivery) -> Self {
        self.delivery = delivery;
        if delivery == SizeDelivery::Descriptor {
            self.flags |= flags::DATA_DESCRIPTOR;
        } else {
            self.flags &= !flags::DATA_DESCRIPTOR;
        }
        self
    }

    /// Pipeline encryption parameters. `crc32` feeds the ZipCrypto check
    /// byte when it is known up front.
    pub fn encryption_params(&self, crc32: u32) -> Result<Encryption<'_>> {
        let password = || {
            self.password.as_ref().ok_or_else(|| Error::PasswordRequired {
                entry_name: self.name.clone(),
            })
        };
        Ok(match self.encryption {
            EncryptionMethod::None => Encryption::None,
            EncryptionMethod::ZipCrypto => Encryption::ZipCrypto {
                password: password()?,
                check: zipcrypto::check_byte(
                    crc32,
                    self.last_modified.time(),
                    self.delivery == SizeDelivery::Descriptor,
                ),
            },
            #[cfg(feature = "aes")]
            EncryptionMethod::Aes(strength) => Encryption::Aes {
                password: password()?,
                strength,
            },
            #[cfg(not(feature = "aes"))]
            EncryptionMethod::Aes(_) => {
                return Err(Error::UnsupportedMethod { method: AES_METHOD });
            }
        })
    }

    fn stored_method(&self) -> u16 {
        match self.encryption {
            EncryptionMethod::Aes(_) => AES_METHOD,
            _ => self.compression.id(),
        }
    }

    fn extra(&self) -> ExtraField {
        let mut extra = ExtraField::new();
        if let EncryptionMethod::Aes(strength) = self.encryption {
            extra.set_aes(Some(AesExtraData {
                vendor_version: AesVendorVersion::Ae2,
                strength,
                compression_method: self.compression.id(),
            }));
        }
        extra
    }

    /// The CRC as stored: AE-2 entries store 0.
    fn stored_crc(&self, crc32: u32) -> u32 {
        match self.encryption {
            EncryptionMethod::Aes(_) => 0,
            _ => crc32,
        }
    }

    /// Returns an error if the measured sizes cannot be recorded in the
    /// space reserved for them.
    pub fn check_fits(&self, measured: &Measured) -> Result<()> {
        let overflow = exceeds_u32(measured.compressed_size) || exceeds_u32(measured.uncompressed_size);
        if overflow && !self.reserve_zip64 && self.delivery != SizeDelivery::Known {
            return Err(Error::UnsupportedFeature {
                feature: "streaming an entry past 4 GiB without large_file",
            });
        }
        Ok(())
    }

    /// The local header: placeholders when `measured` is `None`.
    pub fn local_header(&self, measured: Option<&Measured>) -> LocalFileHeader {
        let (crc32, compressed_size, uncompressed_size) = match (self.delivery, measured) {
            (SizeDelivery::Descriptor, _) => (
                0,
                SizeField::DeferredToDescriptor,
                SizeField::DeferredToDescriptor,
            ),
            (_, Some(m)) => (
                self.stored_crc(m.crc32),
                SizeField::resolve(m.compressed_size, self.reserve_zip64),
                SizeField::resolve(m.uncompressed_size, self.reserve_zip64),
            ),
            (_, None) => (
                0,
                SizeField::resolve(0, self.reserve_zip64),
                SizeField::resolve(0, self.reserve_zip64),
            ),
        };
        let relocated = compressed_size.is_relocated() || uncompressed_size.is_relocated();
        let version_needed = if relocated {
            self.version_needed.max(version::ZIP64)
        } else {
            self.version_needed
        };
        LocalFileHeader {
            version_needed,
            flags: self.flags,
            compression_method: self.stored_method(),
            last_modified: self.last_modified,
            crc32,
            compressed_size,
            uncompressed_size,
            name: self.name.as_bytes().to_vec(),
            extra: self.extra(),
            zip64: self.reserve_zip64,
        }
    }

    /// The Data Descriptor; 8-byte sizes when ZIP64 was reserved.
    pub fn descriptor(&self, measured: &Measured) -> DataDescriptor {
        DataDescriptor {
            crc32: self.stored_crc(measured.crc32),
            compressed_size: measured.compressed_size,
            uncompressed_size: measured.uncompressed_size,
            zip64: self.reserve_zip64,
        }
    }

    /// The finished entry for the central directory.
    pub fn into_entry(self, measured: &Measured, position: HeaderPosition) -> Result<Entry> {
        let mut header = CentralDirectoryHeader {
            version_made_by: version::MADE_BY,
            version_needed: self.version_needed,
            flags: self.flags,
            compression_method: self.stored_method(),
            last_modified: self.last_modified,
            crc32: self.stored_crc(measured.crc32),
            compressed_size: measured.compressed_size,
            uncompressed_size: measured.uncompressed_size,
            disk_number: position.disk,
            internal_attributes: 0,
            external_attributes: self.external_attributes,
            local_header_offset: position.disk_offset,
            name: self.name.as_bytes().to_vec(),
            extra: self.extra(),
            comment: self.comment,
        };
        if header.needs_zip64() {
            header.version_needed = header.version_needed.max(version::ZIP64);
        }
        let mut entry = Entry::from_central(header, position.absolute)?;
        entry.compression_level = Some(self.level);
        Ok(entry)
    }
}
