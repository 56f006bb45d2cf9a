//! Extra Field sub-records.
//!
//! An extra field block is a sequence of `(header ID: u16, length: u16,
//! payload)` triples. Recognized IDs are decoded into
//! [`ExtraFieldRecord`] variants; anything else is kept verbatim so a
//! read-modify-write cycle reproduces it unchanged.

use std::io::Write;

use byteorder::WriteBytesExt;

use super::reader::{ZipOrder, get_u16};
use super::zip64::Zip64ExtendedInfo;
use crate::crypto::{AesStrength, AesVendorVersion};
use crate::{Error, Result};

/// WinZip AES extra data record (header ID `0x9901`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtraData {
    /// AE-1 (CRC stored) or AE-2 (CRC zeroed).
    pub vendor_version: AesVendorVersion,
    /// Key strength.
    pub strength: AesStrength,
    /// The real compression method; the header's method field holds 99.
    pub compression_method: u16,
}

impl AesExtraData {
    /// Extra field header ID.
    pub const HEADER_ID: u16 = 0x9901;

    /// Payload length; always 7.
    pub const PAYLOAD_LEN: u16 = 7;

    /// Two-character vendor ID, "AE".
    pub const VENDOR_ID: u16 = u16::from_le_bytes(*b"AE");

    fn decode(data: &[u8], offset: u64) -> Result<Self> {
        if data.len() != Self::PAYLOAD_LEN as usize {
            return Err(Error::corrupt_header(
                offset,
                format!("AES extra field has length {}, expected 7", data.len()),
            ));
        }
        let mut buf = data;
        let version = get_u16(&mut buf)?;
        let vendor = get_u16(&mut buf)?;
        let strength = buf[0];
        buf = &buf[1..];
        let compression_method = get_u16(&mut buf)?;

        if vendor != Self::VENDOR_ID {
            return Err(Error::corrupt_header(offset, "AES extra field vendor is not 'AE'"));
        }
        let vendor_version = AesVendorVersion::from_u16(version).ok_or_else(|| {
            Error::corrupt_header(offset, format!("unknown AES vendor version {}", version))
        })?;
        let strength = AesStrength::from_u8(strength).ok_or_else(|| {
            Error::corrupt_header(offset, format!("unknown AES strength {}", strength))
        })?;
        Ok(Self {
            vendor_version,
            strength,
            compression_method,
        })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(7);
        let _ = out.write_u16::<ZipOrder>(self.vendor_version as u16);
        let _ = out.write_u16::<ZipOrder>(Self::VENDOR_ID);
        out.push(self.strength as u8);
        let _ = out.write_u16::<ZipOrder>(self.compression_method);
        out
    }
}

/// One decoded extra field sub-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraFieldRecord {
    /// ZIP64 extended information.
    ///
    /// Kept as the raw payload: which values it holds depends on the
    /// sentinels in the owning header, so it is decoded by the resolver
    /// once those are known.
    Zip64(Vec<u8>),
    /// WinZip AES parameters.
    Aes(AesExtraData),
    /// Any other record, preserved as-is.
    Unknown {
        /// Header ID.
        id: u16,
        /// Raw payload.
        data: Vec<u8>,
    },
}

impl ExtraFieldRecord {
    /// The record's header ID.
    pub fn id(&self) -> u16 {
        match self {
            ExtraFieldRecord::Zip64(_) => Zip64ExtendedInfo::HEADER_ID,
            ExtraFieldRecord::Aes(_) => AesExtraData::HEADER_ID,
            ExtraFieldRecord::Unknown { id, .. } => *id,
        }
    }

    fn payload(&self) -> std::borrow::Cow<'_, [u8]> {
        match self {
            ExtraFieldRecord::Zip64(data) | ExtraFieldRecord::Unknown { data, .. } => {
                std::borrow::Cow::Borrowed(data)
            }
            ExtraFieldRecord::Aes(aes) => std::borrow::Cow::Owned(aes.encode()),
        }
    }
}

/// An ordered extra field block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraField {
    records: Vec<ExtraFieldRecord>,
}

impl ExtraField {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a block. `offset` is the absolute position of the block, for
    /// diagnostics.
    ///
    /// A record whose declared length runs past the end of the block, or
    /// stray bytes too short to form a record header, are format errors.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        let mut records = Vec::new();
        let mut pos = 0usize;
        while pos < data.len() {
            let record_offset = offset + pos as u64;
            if data.len() - pos < 4 {
                return Err(Error::corrupt_header(
                    record_offset,
                    format!("{} dangling bytes in extra field", data.len() - pos),
                ));
            }
            let mut head = &data[pos..pos + 4];
            let id = get_u16(&mut head)?;
            let len = get_u16(&mut head)? as usize;
            let start = pos + 4;
            let end = start + len;
            if end > data.len() {
                return Err(Error::corrupt_header(
                    record_offset,
                    format!(
                        "extra field {:#06x} declares {} bytes, only {} remain",
                        id,
                        len,
                        data.len() - start
                    ),
                ));
            }
            let payload = &data[start..end];
            let record = match id {
                Zip64ExtendedInfo::HEADER_ID => ExtraFieldRecord::Zip64(payload.to_vec()),
                AesExtraData::HEADER_ID => {
                    ExtraFieldRecord::Aes(AesExtraData::decode(payload, record_offset)?)
                }
                _ => {
                    log::trace!("preserving unknown extra field {:#06x} ({} bytes)", id, len);
                    ExtraFieldRecord::Unknown {
                        id,
                        data: payload.to_vec(),
                    }
                }
            };
            records.push(record);
            pos = end;
        }
        Ok(Self { records })
    }

    /// Returns the records in stored order.
    pub fn records(&self) -> &[ExtraFieldRecord] {
        &self.records
    }

    /// Returns true if the block holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw ZIP64 payload, if present.
    pub fn zip64_payload(&self) -> Option<&[u8]> {
        self.records.iter().find_map(|r| match r {
            ExtraFieldRecord::Zip64(data) => Some(data.as_slice()),
            _ => None,
        })
    }

    /// AES parameters, if present.
    pub fn aes(&self) -> Option<&AesExtraData> {
        self.records.iter().find_map(|r| match r {
            ExtraFieldRecord::Aes(aes) => Some(aes),
            _ => None,
        })
    }

    /// Replaces (or removes) the ZIP64 record.
    pub fn set_zip64(&mut self, info: Option<&Zip64ExtendedInfo>) {
        self.records
            .retain(|r| !matches!(r, ExtraFieldRecord::Zip64(_)));
        if let Some(info) = info.filter(|i| !i.is_empty()) {
            self.records.insert(0, ExtraFieldRecord::Zip64(info.encode()));
        }
    }

    /// Replaces (or removes) the AES record.
    pub fn set_aes(&mut self, aes: Option<AesExtraData>) {
        self.records.retain(|r| !matches!(r, ExtraFieldRecord::Aes(_)));
        if let Some(aes) = aes {
            self.records.push(ExtraFieldRecord::Aes(aes));
        }
    }

    /// Appends an opaque record.
    pub fn push_unknown(&mut self, id: u16, data: Vec<u8>) {
        self.records.push(ExtraFieldRecord::Unknown { id, data });
    }

    /// Serialized length in bytes.
    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(|r| 4 + r.payload().len()).sum()
    }

    /// Serializes the block: the ZIP64 record first, the others in order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        let zip64 = self
            .records
            .iter()
            .filter(|r| matches!(r, ExtraFieldRecord::Zip64(_)));
        let rest = self
            .records
            .iter()
            .filter(|r| !matches!(r, ExtraFieldRecord::Zip64(_)));
        for record in zip64.chain(rest) {
            let payload = record.payload();
            let _ = out.write_u16::<ZipOrder>(record.id());
            let _ = out.write_u16::<ZipOrder>(payload.len() as u16);
            let _ = out.write_all(&payload);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_le_bytes().to_vec();
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_parse_dispatches_known_records() {
        let mut data = record(0x0001, &0x1_0000_0001u64.to_le_bytes());
        data.extend(record(0x9901, &[2, 0, b'A', b'E', 3, 8, 0]));
        let extra = ExtraField::parse(&data, 0).unwrap();

        assert_eq!(
            extra.zip64_payload(),
            Some(&0x1_0000_0001u64.to_le_bytes()[..])
        );
        let aes = extra.aes().unwrap();
        assert_eq!(aes.vendor_version, AesVendorVersion::Ae2);
        assert_eq!(aes.strength, AesStrength::Aes256);
        assert_eq!(aes.compression_method, 8);
    }

    #[test]
    fn test_unknown_records_roundtrip_unchanged() {
        let mut data = record(0x5455, &[1, 2, 3, 4, 5]);
        data.extend(record(0x7875, &[1, 4, 0xe8, 3, 0, 0]));
        let extra = ExtraField::parse(&data, 0).unwrap();
        assert_eq!(extra.records().len(), 2);
        assert_eq!(extra.encode(), data);
    }

    #[test]
    fn test_zip64_serialized_first() {
        let mut extra = ExtraField::parse(&record(0xcafe, &[9]), 0).unwrap();
        extra.set_zip64(Some(&Zip64ExtendedInfo {
            uncompressed_size: Some(1),
            ..Default::default()
        }));
        let encoded = extra.encode();
        assert_eq!(&encoded[..4], &[0x01, 0x00, 8, 0]);
        assert_eq!(&encoded[12..], &record(0xcafe, &[9])[..]);
    }

    #[test]
    fn test_set_zip64_none_removes_record() {
        let mut extra = ExtraField::new();
        extra.set_zip64(Some(&Zip64ExtendedInfo {
            compressed_size: Some(1),
            ..Default::default()
        }));
        assert!(extra.zip64_payload().is_some());
        extra.set_zip64(None);
        assert!(extra.is_empty());
    }

    #[test]
    fn test_overlong_length_is_fatal() {
        let mut data = record(0x1234, &[0; 4]);
        data[2] = 40;
        let err = ExtraField::parse(&data, 100).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { offset: 100, .. }));
    }

    #[test]
    fn test_dangling_bytes_are_fatal() {
        let mut data = record(0x1234, &[0; 2]);
        data.extend([0, 0]);
        assert!(ExtraField::parse(&data, 0).is_err());
    }

    #[test]
    fn test_bad_aes_vendor_rejected() {
        let data = record(0x9901, &[2, 0, b'X', b'X', 3, 8, 0]);
        assert!(ExtraField::parse(&data, 0).is_err());
    }
}
