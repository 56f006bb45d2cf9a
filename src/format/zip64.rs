//! ZIP64 overflow resolver.
//!
//! The single place that decides whether a value fits its classic 32-bit
//! (or 16-bit) header field. A value that does not fit is written as an
//! all-ones sentinel and its true value moves into a ZIP64 record: the
//! per-entry [`Zip64ExtendedInfo`] extra field, or the ZIP64
//! End-of-Central-Directory for archive-level counts and offsets.
//!
//! The same thresholds are applied when writing and when reading, so a
//! field is relocated on write exactly when its sentinel triggers a lookup
//! on read.

use std::io::Write;

use byteorder::WriteBytesExt;

use super::reader::{ZipOrder, get_u32, get_u64};
use crate::{Error, Result};

/// Sentinel stored in a relocated 32-bit size or offset field.
pub const SENTINEL_U32: u32 = u32::MAX;

/// Sentinel stored in a relocated 16-bit count or disk-number field.
pub const SENTINEL_U16: u16 = u16::MAX;

/// 32-bit sizes and offsets relocate at or above this value.
pub const ZIP64_BYTES_THRESHOLD: u64 = SENTINEL_U32 as u64;

/// 16-bit entry counts and disk numbers relocate at or above this value.
pub const ZIP64_COUNT_THRESHOLD: u64 = SENTINEL_U16 as u64;

/// Returns true if a size or offset does not fit its 32-bit field.
pub fn exceeds_u32(value: u64) -> bool {
    value >= ZIP64_BYTES_THRESHOLD
}

/// Returns true if a count or disk number does not fit its 16-bit field.
pub fn exceeds_u16(value: u64) -> bool {
    value >= ZIP64_COUNT_THRESHOLD
}

/// State of a 32-bit size or offset field in a header.
///
/// Makes the two magic encodings explicit so a sentinel can never be
/// mistaken for a real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeField {
    /// The value is stored directly in the field.
    Known(u64),
    /// The field holds 0; the value follows the data in a Data Descriptor.
    DeferredToDescriptor,
    /// The field holds the sentinel; the value lives in the ZIP64 record.
    RelocatedToZip64(u64),
}

impl SizeField {
    /// Chooses the encoding for `value`.
    ///
    /// `force_zip64` relocates even values that would fit, which local
    /// headers need when the ZIP64 record was reserved before the size was
    /// known.
    pub fn resolve(value: u64, force_zip64: bool) -> Self {
        if force_zip64 || exceeds_u32(value) {
            SizeField::RelocatedToZip64(value)
        } else {
            SizeField::Known(value)
        }
    }

    /// The raw 32-bit value written to the header.
    pub fn raw(self) -> u32 {
        match self {
            SizeField::Known(v) => u32::try_from(v).unwrap_or(SENTINEL_U32),
            SizeField::DeferredToDescriptor => 0,
            SizeField::RelocatedToZip64(_) => SENTINEL_U32,
        }
    }

    /// The true value, if the header carries it at all.
    pub fn value(self) -> Option<u64> {
        match self {
            SizeField::Known(v) | SizeField::RelocatedToZip64(v) => Some(v),
            SizeField::DeferredToDescriptor => None,
        }
    }

    /// Returns true if the value lives in the ZIP64 record.
    pub fn is_relocated(self) -> bool {
        matches!(self, SizeField::RelocatedToZip64(_))
    }
}

/// Which classic header fields hold a sentinel.
///
/// On read these say which values the ZIP64 extra record must supply; the
/// record carries exactly those, in this field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relocations {
    /// Uncompressed size field is `0xFFFFFFFF`.
    pub uncompressed_size: bool,
    /// Compressed size field is `0xFFFFFFFF`.
    pub compressed_size: bool,
    /// Local header offset field is `0xFFFFFFFF`.
    pub local_header_offset: bool,
    /// Disk number field is `0xFFFF`.
    pub disk_number: bool,
}

impl Relocations {
    /// Detects sentinels in raw central directory fields.
    pub fn from_raw(uncompressed: u32, compressed: u32, offset: u32, disk: u16) -> Self {
        Self {
            uncompressed_size: uncompressed == SENTINEL_U32,
            compressed_size: compressed == SENTINEL_U32,
            local_header_offset: offset == SENTINEL_U32,
            disk_number: disk == SENTINEL_U16,
        }
    }

    /// Returns true if any field is relocated.
    pub fn any(&self) -> bool {
        self.uncompressed_size || self.compressed_size || self.local_header_offset || self.disk_number
    }

    /// Number of payload bytes the ZIP64 record must provide.
    pub fn payload_len(&self) -> usize {
        8 * (self.uncompressed_size as usize
            + self.compressed_size as usize
            + self.local_header_offset as usize)
            + 4 * self.disk_number as usize
    }
}

/// The ZIP64 Extended Information extra field (header ID `0x0001`).
///
/// Only the relocated values are present; absent values are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64ExtendedInfo {
    /// Original uncompressed size.
    pub uncompressed_size: Option<u64>,
    /// Size of the compressed data.
    pub compressed_size: Option<u64>,
    /// Offset of the local header relative to its disk.
    pub local_header_offset: Option<u64>,
    /// Number of the disk holding the local header.
    pub disk_number: Option<u32>,
}

impl Zip64ExtendedInfo {
    /// Extra field header ID.
    pub const HEADER_ID: u16 = 0x0001;

    /// Returns true if no value is relocated.
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size.is_none()
            && self.compressed_size.is_none()
            && self.local_header_offset.is_none()
            && self.disk_number.is_none()
    }

    /// Serializes the payload in the fixed field order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(28);
        // Writes into a Vec cannot fail.
        for value in [
            self.uncompressed_size,
            self.compressed_size,
            self.local_header_offset,
        ]
        .into_iter()
        .flatten()
        {
            let _ = out.write_u64::<ZipOrder>(value);
        }
        if let Some(disk) = self.disk_number {
            let _ = out.write_u32::<ZipOrder>(disk);
        }
        out
    }

    /// Parses a payload, consuming exactly the values `wanted` names.
    ///
    /// Trailing bytes are ignored; some writers emit every field regardless
    /// of which ones overflowed. A payload too short for the requested
    /// values is a format error at `offset`.
    pub fn decode(data: &[u8], wanted: Relocations, offset: u64) -> Result<Self> {
        if data.len() < wanted.payload_len() {
            return Err(Error::corrupt_header(
                offset,
                format!(
                    "ZIP64 extra field holds {} bytes, {} required",
                    data.len(),
                    wanted.payload_len()
                ),
            ));
        }
        let mut buf = data;
        let mut info = Self::default();
        if wanted.uncompressed_size {
            info.uncompressed_size = Some(get_u64(&mut buf)?);
        }
        if wanted.compressed_size {
            info.compressed_size = Some(get_u64(&mut buf)?);
        }
        if wanted.local_header_offset {
            info.local_header_offset = Some(get_u64(&mut buf)?);
        }
        if wanted.disk_number {
            info.disk_number = Some(get_u32(&mut buf)?);
        }
        Ok(info)
    }

    /// Writes the complete sub-record (ID, length, payload).
    pub fn write_record<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        let payload = self.encode();
        w.write_u16::<ZipOrder>(Self::HEADER_ID)?;
        w.write_u16::<ZipOrder>(payload.len() as u16)?;
        w.write_all(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        assert!(!exceeds_u32(0xFFFF_FFFE));
        assert!(exceeds_u32(0xFFFF_FFFF));
        assert!(exceeds_u32(0x1_0000_0001));
        assert!(!exceeds_u16(0xFFFE));
        assert!(exceeds_u16(0xFFFF));
    }

    #[test]
    fn test_size_field_raw_encodings() {
        assert_eq!(SizeField::resolve(10, false), SizeField::Known(10));
        assert_eq!(SizeField::resolve(10, false).raw(), 10);
        assert_eq!(SizeField::DeferredToDescriptor.raw(), 0);
        assert_eq!(SizeField::DeferredToDescriptor.value(), None);

        let big = SizeField::resolve(0x1_0000_0001, false);
        assert!(big.is_relocated());
        assert_eq!(big.raw(), SENTINEL_U32);
        assert_eq!(big.value(), Some(0x1_0000_0001));

        let forced = SizeField::resolve(5, true);
        assert_eq!(forced, SizeField::RelocatedToZip64(5));
    }

    #[test]
    fn test_encode_only_relocated_fields_in_order() {
        let info = Zip64ExtendedInfo {
            uncompressed_size: Some(0x1_0000_0001),
            compressed_size: None,
            local_header_offset: Some(0x2_0000_0000),
            disk_number: None,
        };
        let payload = info.encode();
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[..8], &0x1_0000_0001u64.to_le_bytes());
        assert_eq!(&payload[8..], &0x2_0000_0000u64.to_le_bytes());
    }

    #[test]
    fn test_decode_consumes_exactly_wanted_fields() {
        let info = Zip64ExtendedInfo {
            uncompressed_size: None,
            compressed_size: Some(7),
            local_header_offset: None,
            disk_number: Some(3),
        };
        let payload = info.encode();
        let wanted = Relocations {
            compressed_size: true,
            disk_number: true,
            ..Default::default()
        };
        assert_eq!(wanted.payload_len(), 12);
        let decoded = Zip64ExtendedInfo::decode(&payload, wanted, 0).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_decode_short_payload_is_error() {
        let wanted = Relocations {
            uncompressed_size: true,
            compressed_size: true,
            ..Default::default()
        };
        let err = Zip64ExtendedInfo::decode(&[0u8; 8], wanted, 99).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { offset: 99, .. }));
    }

    #[test]
    fn test_relocations_from_raw() {
        let r = Relocations::from_raw(SENTINEL_U32, 5, 0, SENTINEL_U16);
        assert!(r.uncompressed_size);
        assert!(!r.compressed_size);
        assert!(!r.local_header_offset);
        assert!(r.disk_number);
        assert!(r.any());
        assert!(!Relocations::from_raw(1, 2, 3, 4).any());
    }
}
