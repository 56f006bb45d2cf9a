//! Local File Header and Data Descriptor records.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::WriteBytesExt;

use super::extra::ExtraField;
use super::reader::{ZipOrder, expect_signature, get_u16, get_u32, get_u64, put_len16, read_fixed};
use super::zip64::{Relocations, SENTINEL_U32, SizeField, Zip64ExtendedInfo};
use super::{DATA_DESCRIPTOR_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE, LOCAL_FILE_HEADER_SIZE, flags};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// The record that precedes each entry's data.
///
/// CRC and sizes are only meaningful when the entry does not use a Data
/// Descriptor; otherwise they are [`SizeField::DeferredToDescriptor`] and
/// the CRC is 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Raw compression method (99 for AES-encrypted entries).
    pub compression_method: u16,
    /// Last modification time.
    pub last_modified: DosDateTime,
    /// CRC-32 of the uncompressed data, or 0 when deferred or AE-2.
    pub crc32: u32,
    /// Compressed size field.
    pub compressed_size: SizeField,
    /// Uncompressed size field.
    pub uncompressed_size: SizeField,
    /// Entry name bytes.
    pub name: Vec<u8>,
    /// Extra records other than ZIP64 (which [`zip64`](Self::zip64) controls).
    pub extra: ExtraField,
    /// Carry a ZIP64 record with both sizes.
    ///
    /// Set whenever either size is relocated, and for streamed entries that
    /// may grow past 4 GiB, where the record's presence tells readers the
    /// Data Descriptor uses 8-byte sizes.
    pub zip64: bool,
}

/// Byte lengths of a Local File Header, enough to locate entry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalHeaderSpan {
    /// Absolute offset of the header.
    pub offset: u64,
    /// Length of the name field.
    pub name_len: u16,
    /// Length of the extra field block.
    pub extra_len: u16,
}

impl LocalHeaderSpan {
    /// Total header length including variable fields.
    pub fn header_len(&self) -> u64 {
        LOCAL_FILE_HEADER_SIZE + self.name_len as u64 + self.extra_len as u64
    }

    /// Absolute offset of the first data byte.
    pub fn data_offset(&self) -> u64 {
        self.offset + self.header_len()
    }
}

impl LocalFileHeader {
    /// Offset of the CRC field from the start of the record.
    pub const CRC_FIELD_OFFSET: u64 = 14;

    /// Reads only the signature and length fields of the header at `offset`.
    ///
    /// This is what extraction needs: entry metadata comes from the central
    /// directory, and the local extra block may contain alignment padding
    /// that is not a valid record sequence.
    pub fn read_span<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<LocalHeaderSpan> {
        reader.seek(SeekFrom::Start(offset))?;
        let buf = read_fixed(reader, LOCAL_FILE_HEADER_SIZE as usize, offset, "local file header")?;
        let mut fields = &buf[..];
        expect_signature(&mut fields, LOCAL_FILE_HEADER_SIGNATURE, offset)?;
        let mut lengths = &buf[26..30];
        Ok(LocalHeaderSpan {
            offset,
            name_len: get_u16(&mut lengths)?,
            extra_len: get_u16(&mut lengths)?,
        })
    }

    /// Reads and decodes the complete header at `offset`.
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;
        let buf = read_fixed(reader, LOCAL_FILE_HEADER_SIZE as usize, offset, "local file header")?;
        let mut b = &buf[..];
        expect_signature(&mut b, LOCAL_FILE_HEADER_SIGNATURE, offset)?;
        let version_needed = get_u16(&mut b)?;
        let gp_flags = get_u16(&mut b)?;
        let compression_method = get_u16(&mut b)?;
        let time = get_u16(&mut b)?;
        let date = get_u16(&mut b)?;
        let crc32 = get_u32(&mut b)?;
        let raw_compressed = get_u32(&mut b)?;
        let raw_uncompressed = get_u32(&mut b)?;
        let name_len = get_u16(&mut b)? as usize;
        let extra_len = get_u16(&mut b)? as usize;

        let name = read_fixed(reader, name_len, offset, "local file name")?;
        let extra_offset = offset + LOCAL_FILE_HEADER_SIZE + name_len as u64;
        let raw_extra = read_fixed(reader, extra_len, offset, "local extra field")?;
        let mut extra = ExtraField::parse(&raw_extra, extra_offset)?;

        let zip64_payload = extra.zip64_payload().map(<[u8]>::to_vec);
        let zip64 = zip64_payload.is_some();
        let info = match &zip64_payload {
            Some(payload) => Zip64ExtendedInfo::decode(
                payload,
                Relocations {
                    uncompressed_size: raw_uncompressed == SENTINEL_U32,
                    compressed_size: raw_compressed == SENTINEL_U32,
                    ..Default::default()
                },
                extra_offset,
            )?,
            None => Zip64ExtendedInfo::default(),
        };
        extra.set_zip64(None);

        let deferred = gp_flags & flags::DATA_DESCRIPTOR != 0;
        let decode = |raw: u32, relocated: Option<u64>, what: &str| -> Result<SizeField> {
            if raw == SENTINEL_U32 {
                relocated.map(SizeField::RelocatedToZip64).ok_or_else(|| {
                    Error::corrupt_header(offset, format!("{} relocated without ZIP64 record", what))
                })
            } else if deferred && raw == 0 {
                Ok(SizeField::DeferredToDescriptor)
            } else {
                Ok(SizeField::Known(raw as u64))
            }
        };

        Ok(Self {
            version_needed,
            flags: gp_flags,
            compression_method,
            last_modified: DosDateTime::from_parts(date, time),
            crc32,
            compressed_size: decode(raw_compressed, info.compressed_size, "compressed size")?,
            uncompressed_size: decode(raw_uncompressed, info.uncompressed_size, "uncompressed size")?,
            name,
            extra,
            zip64,
        })
    }

    fn zip64_record(&self) -> Option<Zip64ExtendedInfo> {
        let relocated = self.compressed_size.is_relocated() || self.uncompressed_size.is_relocated();
        (self.zip64 || relocated).then(|| Zip64ExtendedInfo {
            uncompressed_size: Some(self.uncompressed_size.value().unwrap_or(0)),
            compressed_size: Some(self.compressed_size.value().unwrap_or(0)),
            local_header_offset: None,
            disk_number: None,
        })
    }

    /// Serializes the header.
    ///
    /// Relocated sizes are written as sentinels with the true values in a
    /// ZIP64 record placed first in the extra block.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        let mut extra = self.extra.clone();
        extra.set_zip64(self.zip64_record().as_ref());
        let extra = extra.encode();

        let mut out = Vec::with_capacity(LOCAL_FILE_HEADER_SIZE as usize + self.name.len() + extra.len());
        out.write_u32::<ZipOrder>(LOCAL_FILE_HEADER_SIGNATURE)?;
        out.write_u16::<ZipOrder>(self.version_needed)?;
        out.write_u16::<ZipOrder>(self.flags)?;
        out.write_u16::<ZipOrder>(self.compression_method)?;
        out.write_u16::<ZipOrder>(self.last_modified.time())?;
        out.write_u16::<ZipOrder>(self.last_modified.date())?;
        out.write_u32::<ZipOrder>(self.crc32)?;
        out.write_u32::<ZipOrder>(self.compressed_size.raw())?;
        out.write_u32::<ZipOrder>(self.uncompressed_size.raw())?;
        put_len16(&mut out, self.name.len(), "entry name")?;
        put_len16(&mut out, extra.len(), "extra field")?;
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&extra);
        Ok(out)
    }

    /// Writes the serialized header.
    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<u64> {
        let bytes = self.encode()?;
        w.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Trailing record carrying CRC and sizes for a deferred entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    /// CRC-32 of the uncompressed data (0 for AE-2 entries).
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub uncompressed_size: u64,
    /// Use 8-byte size fields.
    pub zip64: bool,
}

impl DataDescriptor {
    /// Encoded length including the signature.
    pub fn encoded_len(zip64: bool) -> u64 {
        if zip64 { 24 } else { 16 }
    }

    /// Writes the descriptor with its (optional but customary) signature.
    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<u64> {
        let mut out = Vec::with_capacity(24);
        out.write_u32::<ZipOrder>(DATA_DESCRIPTOR_SIGNATURE)?;
        out.write_u32::<ZipOrder>(self.crc32)?;
        if self.zip64 {
            out.write_u64::<ZipOrder>(self.compressed_size)?;
            out.write_u64::<ZipOrder>(self.uncompressed_size)?;
        } else {
            out.write_u32::<ZipOrder>(self.compressed_size as u32)?;
            out.write_u32::<ZipOrder>(self.uncompressed_size as u32)?;
        }
        w.write_all(&out)?;
        Ok(out.len() as u64)
    }

    /// Reads a descriptor at the current position.
    ///
    /// The signature is optional in the format; both layouts are accepted.
    /// Returns the descriptor and its encoded length.
    pub fn read<R: Read>(reader: &mut R, offset: u64, zip64: bool) -> Result<(Self, u64)> {
        let size_len = if zip64 { 16 } else { 8 };
        let buf = read_fixed(reader, 4 + size_len, offset, "data descriptor")?;
        let mut b = &buf[..];
        let first = get_u32(&mut b)?;
        let (crc32, body, len) = if first == DATA_DESCRIPTOR_SIGNATURE {
            let rest = read_fixed(reader, 4, offset, "data descriptor")?;
            let mut tail = b.to_vec();
            tail.extend_from_slice(&rest);
            let mut t = &tail[..];
            let crc = get_u32(&mut t)?;
            (crc, t.to_vec(), 8 + size_len as u64)
        } else {
            (first, b.to_vec(), 4 + size_len as u64)
        };
        let mut s = &body[..];
        let (compressed_size, uncompressed_size) = if zip64 {
            (get_u64(&mut s)?, get_u64(&mut s)?)
        } else {
            (get_u32(&mut s)? as u64, get_u32(&mut s)? as u64)
        };
        Ok((
            Self {
                crc32,
                compressed_size,
                uncompressed_size,
                zip64,
            },
            len,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(compressed: SizeField, uncompressed: SizeField, gp: u16) -> LocalFileHeader {
        LocalFileHeader {
            version_needed: 20,
            flags: gp,
            compression_method: 0,
            last_modified: DosDateTime::MIN,
            crc32: 0x1234_5678,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
            name: b"hello.txt".to_vec(),
            extra: ExtraField::new(),
            zip64: false,
        }
    }

    #[test]
    fn test_known_sizes_roundtrip() {
        let h = header(SizeField::Known(10), SizeField::Known(10), 0);
        let bytes = h.encode().unwrap();
        assert_eq!(bytes.len(), 30 + 9);
        assert_eq!(&bytes[18..22], &10u32.to_le_bytes());
        assert_eq!(&bytes[22..26], &10u32.to_le_bytes());

        let parsed = LocalFileHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn test_deferred_fields_are_zero() {
        let mut h = header(
            SizeField::DeferredToDescriptor,
            SizeField::DeferredToDescriptor,
            flags::DATA_DESCRIPTOR,
        );
        h.crc32 = 0;
        let bytes = h.encode().unwrap();
        assert_eq!(&bytes[14..26], &[0u8; 12]);
        let parsed = LocalFileHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(parsed.compressed_size, SizeField::DeferredToDescriptor);
    }

    #[test]
    fn test_relocated_size_writes_sentinel_and_record() {
        let h = header(
            SizeField::RelocatedToZip64(0x1_0000_0001),
            SizeField::RelocatedToZip64(0x1_0000_0001),
            0,
        );
        let bytes = h.encode().unwrap();
        assert_eq!(&bytes[22..26], &[0xff; 4]);
        let extra = &bytes[30 + 9..];
        assert_eq!(&extra[..4], &[0x01, 0x00, 16, 0]);
        assert_eq!(&extra[4..12], &0x1_0000_0001u64.to_le_bytes());

        let parsed = LocalFileHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(
            parsed.uncompressed_size,
            SizeField::RelocatedToZip64(0x1_0000_0001)
        );
        assert!(parsed.zip64);
    }

    #[test]
    fn test_span_locates_data() {
        let h = header(SizeField::Known(3), SizeField::Known(3), 0);
        let mut bytes = vec![0u8; 5];
        bytes.extend(h.encode().unwrap());
        bytes.extend(b"abc");
        let span = LocalFileHeader::read_span(&mut Cursor::new(&bytes), 5).unwrap();
        assert_eq!(span.data_offset(), 5 + 39);
        assert_eq!(&bytes[span.data_offset() as usize..], b"abc");
    }

    #[test]
    fn test_wrong_signature() {
        let bytes = vec![0u8; 64];
        let err = LocalFileHeader::read(&mut Cursor::new(&bytes), 0).unwrap_err();
        assert!(matches!(err, Error::SignatureMismatch { .. }));
    }

    #[test]
    fn test_data_descriptor_layouts() {
        let dd = DataDescriptor {
            crc32: 0xAABBCCDD,
            compressed_size: 5,
            uncompressed_size: 9,
            zip64: false,
        };
        let mut out = Vec::new();
        assert_eq!(dd.write(&mut out).unwrap(), 16);
        let (parsed, len) = DataDescriptor::read(&mut Cursor::new(&out), 0, false).unwrap();
        assert_eq!(parsed, dd);
        assert_eq!(len, 16);

        let big = DataDescriptor {
            zip64: true,
            uncompressed_size: 0x1_0000_0000,
            ..dd
        };
        let mut out = Vec::new();
        assert_eq!(big.write(&mut out).unwrap(), 24);
        let (parsed, _) = DataDescriptor::read(&mut Cursor::new(&out), 0, true).unwrap();
        assert_eq!(parsed, big);

        // Signature-less form.
        let bare = &out[4..];
        let (parsed, len) = DataDescriptor::read(&mut Cursor::new(bare), 0, true).unwrap();
        assert_eq!(parsed, big);
        assert_eq!(len, 20);
    }
}
