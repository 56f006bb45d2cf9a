//! Central Directory File Header and Digital Signature records.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::WriteBytesExt;

use super::extra::ExtraField;
use super::reader::{
    ZipOrder, expect_signature, get_u16, get_u32, put_len16, read_fixed, truncated,
};
use super::zip64::{Relocations, SENTINEL_U16, SizeField, Zip64ExtendedInfo, exceeds_u16};
use super::{
    CENTRAL_DIRECTORY_HEADER_SIZE, CENTRAL_DIRECTORY_SIGNATURE, DIGITAL_SIGNATURE_SIGNATURE,
};
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

/// One entry's record in the central directory, with ZIP64 values resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    /// Version made by (host system in the high byte).
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Raw compression method (99 for AES-encrypted entries).
    pub compression_method: u16,
    /// Last modification time.
    pub last_modified: DosDateTime,
    /// CRC-32 of the uncompressed data (0 for AE-2 entries).
    pub crc32: u32,
    /// Compressed size, including encryption overhead.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub uncompressed_size: u64,
    /// Disk holding the local header.
    pub disk_number: u32,
    /// Internal file attributes.
    pub internal_attributes: u16,
    /// External file attributes (Unix mode in the high 16 bits).
    pub external_attributes: u32,
    /// Offset of the local header relative to the start of its disk.
    pub local_header_offset: u64,
    /// Entry name bytes.
    pub name: Vec<u8>,
    /// Extra records other than ZIP64.
    pub extra: ExtraField,
    /// File comment bytes.
    pub comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    /// Relocation decisions for this header's values.
    pub fn relocations(&self) -> Relocations {
        Relocations {
            uncompressed_size: SizeField::resolve(self.uncompressed_size, false).is_relocated(),
            compressed_size: SizeField::resolve(self.compressed_size, false).is_relocated(),
            local_header_offset: SizeField::resolve(self.local_header_offset, false).is_relocated(),
            disk_number: exceeds_u16(self.disk_number as u64),
        }
    }

    /// Returns true if any field needs the ZIP64 record.
    pub fn needs_zip64(&self) -> bool {
        self.relocations().any()
    }

    /// Reads one header at the reader's current position, which is `offset`.
    ///
    /// Sentinel-valued fields are replaced by the values in the ZIP64 extra
    /// record, consumed in the fixed field order.
    pub fn read<R: Read>(reader: &mut R, offset: u64) -> Result<(Self, u64)> {
        let buf = read_fixed(
            reader,
            CENTRAL_DIRECTORY_HEADER_SIZE as usize,
            offset,
            "central directory header",
        )?;
        let mut b = &buf[..];
        expect_signature(&mut b, CENTRAL_DIRECTORY_SIGNATURE, offset)?;
        let version_made_by = get_u16(&mut b)?;
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
        let comment_len = get_u16(&mut b)? as usize;
        let raw_disk = get_u16(&mut b)?;
        let internal_attributes = get_u16(&mut b)?;
        let external_attributes = get_u32(&mut b)?;
        let raw_offset = get_u32(&mut b)?;

        let name = read_fixed(reader, name_len, offset, "entry name")?;
        let extra_offset = offset + CENTRAL_DIRECTORY_HEADER_SIZE + name_len as u64;
        let raw_extra = read_fixed(reader, extra_len, offset, "extra field")?;
        let comment = read_fixed(reader, comment_len, offset, "entry comment")?;
        let mut extra = ExtraField::parse(&raw_extra, extra_offset)?;

        let wanted = Relocations::from_raw(raw_uncompressed, raw_compressed, raw_offset, raw_disk);
        let info = if wanted.any() {
            let payload = extra.zip64_payload().ok_or_else(|| {
                Error::corrupt_header(offset, "sentinel value without ZIP64 extra field")
            })?;
            Zip64ExtendedInfo::decode(payload, wanted, extra_offset)?
        } else {
            Zip64ExtendedInfo::default()
        };
        extra.set_zip64(None);

        let header = Self {
            version_made_by,
            version_needed,
            flags: gp_flags,
            compression_method,
            last_modified: DosDateTime::from_parts(date, time),
            crc32,
            compressed_size: info.compressed_size.unwrap_or(raw_compressed as u64),
            uncompressed_size: info.uncompressed_size.unwrap_or(raw_uncompressed as u64),
            disk_number: info.disk_number.unwrap_or(raw_disk as u32),
            internal_attributes,
            external_attributes,
            local_header_offset: info.local_header_offset.unwrap_or(raw_offset as u64),
            name,
            extra,
            comment,
        };
        let len = CENTRAL_DIRECTORY_HEADER_SIZE + (name_len + extra_len + comment_len) as u64;
        Ok((header, len))
    }

    /// Serializes the header, relocating overflowing values into a ZIP64
    /// record placed first in the extra block.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        let relocations = self.relocations();
        let info = Zip64ExtendedInfo {
            uncompressed_size: relocations
                .uncompressed_size
                .then_some(self.uncompressed_size),
            compressed_size: relocations.compressed_size.then_some(self.compressed_size),
            local_header_offset: relocations
                .local_header_offset
                .then_some(self.local_header_offset),
            disk_number: relocations.disk_number.then_some(self.disk_number),
        };
        let mut extra = self.extra.clone();
        extra.set_zip64(Some(&info));
        let extra = extra.encode();

        let disk = if relocations.disk_number {
            SENTINEL_U16
        } else {
            self.disk_number as u16
        };

        let mut out = Vec::with_capacity(
            CENTRAL_DIRECTORY_HEADER_SIZE as usize + self.name.len() + extra.len() + self.comment.len(),
        );
        out.write_u32::<ZipOrder>(CENTRAL_DIRECTORY_SIGNATURE)?;
        out.write_u16::<ZipOrder>(self.version_made_by)?;
        out.write_u16::<ZipOrder>(self.version_needed)?;
        out.write_u16::<ZipOrder>(self.flags)?;
        out.write_u16::<ZipOrder>(self.compression_method)?;
        out.write_u16::<ZipOrder>(self.last_modified.time())?;
        out.write_u16::<ZipOrder>(self.last_modified.date())?;
        out.write_u32::<ZipOrder>(self.crc32)?;
        out.write_u32::<ZipOrder>(SizeField::resolve(self.compressed_size, false).raw())?;
        out.write_u32::<ZipOrder>(SizeField::resolve(self.uncompressed_size, false).raw())?;
        put_len16(&mut out, self.name.len(), "entry name")?;
        put_len16(&mut out, extra.len(), "extra field")?;
        put_len16(&mut out, self.comment.len(), "entry comment")?;
        out.write_u16::<ZipOrder>(disk)?;
        out.write_u16::<ZipOrder>(self.internal_attributes)?;
        out.write_u32::<ZipOrder>(self.external_attributes)?;
        out.write_u32::<ZipOrder>(SizeField::resolve(self.local_header_offset, false).raw())?;
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&extra);
        out.extend_from_slice(&self.comment);
        Ok(out)
    }

    /// Writes the serialized header and returns its length.
    pub fn write<W: Write>(&self, w: &mut W) -> std::io::Result<u64> {
        let bytes = self.encode()?;
        w.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// The parsed central directory block.
#[derive(Debug, Clone, Default)]
pub struct CentralDirectory {
    /// File headers in stored order.
    pub headers: Vec<CentralDirectoryHeader>,
    /// Digital signature payload, if the block ends with one.
    pub digital_signature: Option<Vec<u8>>,
    /// Bytes occupied by the headers plus the signature record.
    pub size: u64,
}

/// Reads exactly `count` file headers starting at absolute `offset`,
/// followed by an optional digital signature record.
///
/// Any header with a wrong signature aborts the whole read.
pub fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    count: u64,
) -> Result<CentralDirectory> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut reader = std::io::BufReader::new(reader);
    // Cap the pre-allocation; `count` comes from untrusted input.
    let mut headers = Vec::with_capacity(count.min(4096) as usize);
    let mut position = offset;
    for _ in 0..count {
        let (header, len) = CentralDirectoryHeader::read(&mut reader, position)?;
        headers.push(header);
        position += len;
    }

    let mut digital_signature = None;
    let mut sig = [0u8; 4];
    match reader.read_exact(&mut sig) {
        Ok(()) if u32::from_le_bytes(sig) == DIGITAL_SIGNATURE_SIGNATURE => {
            let mut len = [0u8; 2];
            reader
                .read_exact(&mut len)
                .map_err(|e| truncated(e, position, "digital signature"))?;
            let len = u16::from_le_bytes(len) as usize;
            let data = read_fixed(&mut reader, len, position, "digital signature")?;
            position += 6 + len as u64;
            digital_signature = Some(data);
        }
        // Absent signature record: whatever follows belongs to the trailer.
        _ => {}
    }

    Ok(CentralDirectory {
        headers,
        digital_signature,
        size: position - offset,
    })
}

/// Serializes a digital signature record.
pub fn encode_digital_signature(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(6 + data.len());
    out.write_u32::<ZipOrder>(DIGITAL_SIGNATURE_SIGNATURE)?;
    put_len16(&mut out, data.len(), "digital signature")?;
    out.extend_from_slice(data);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(name: &str) -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            version_made_by: super::super::version::MADE_BY,
            version_needed: 20,
            flags: 0,
            compression_method: 8,
            last_modified: DosDateTime::new(2020, 5, 17, 10, 11, 12).unwrap(),
            crc32: 0xCAFE_BABE,
            compressed_size: 100,
            uncompressed_size: 200,
            disk_number: 0,
            internal_attributes: 0,
            external_attributes: 0o100644 << 16,
            local_header_offset: 0,
            name: name.as_bytes().to_vec(),
            extra: ExtraField::new(),
            comment: b"note".to_vec(),
        }
    }

    #[test]
    fn test_roundtrip_without_zip64() {
        let h = sample("a.txt");
        let bytes = h.encode().unwrap();
        assert_eq!(bytes.len(), 46 + 5 + 4);
        let (parsed, len) = CentralDirectoryHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(len, bytes.len() as u64);
        assert!(!h.needs_zip64());
    }

    #[test]
    fn test_large_uncompressed_size_relocates() {
        let mut h = sample("big.bin");
        h.uncompressed_size = 0x1_0000_0001;
        let bytes = h.encode().unwrap();
        // Uncompressed size field at offset 24, compressed at 20.
        assert_eq!(&bytes[24..28], &[0xff; 4]);
        assert_eq!(&bytes[20..24], &100u32.to_le_bytes());
        let extra_start = 46 + h.name.len();
        assert_eq!(&bytes[extra_start..extra_start + 4], &[1, 0, 8, 0]);
        assert_eq!(
            &bytes[extra_start + 4..extra_start + 12],
            &0x1_0000_0001u64.to_le_bytes()
        );

        let (parsed, _) = CentralDirectoryHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(parsed.uncompressed_size, 0x1_0000_0001);
        assert_eq!(parsed.compressed_size, 100);
    }

    #[test]
    fn test_all_fields_relocated_in_fixed_order() {
        let mut h = sample("x");
        h.uncompressed_size = 0xFFFF_FFFF;
        h.compressed_size = 0x2_0000_0000;
        h.local_header_offset = 0x3_0000_0000;
        h.disk_number = 0x1_0000;
        let bytes = h.encode().unwrap();
        let (parsed, _) = CentralDirectoryHeader::read(&mut Cursor::new(&bytes), 0).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(&bytes[34..36], &[0xff, 0xff]);
    }

    #[test]
    fn test_sentinel_without_record_is_corrupt() {
        let mut bytes = sample("x").encode().unwrap();
        bytes[24..28].copy_from_slice(&[0xff; 4]);
        let err = CentralDirectoryHeader::read(&mut Cursor::new(&bytes), 0).unwrap_err();
        assert!(matches!(err, Error::CorruptHeader { .. }));
    }

    #[test]
    fn test_read_directory_with_signature_record() {
        let mut block = Vec::new();
        block.extend(sample("one").encode().unwrap());
        block.extend(sample("two").encode().unwrap());
        let headers_len = block.len() as u64;
        block.extend(encode_digital_signature(b"sig").unwrap());
        block.extend([0x50, 0x4b, 0x05, 0x06]);

        let cd = read_central_directory(&mut Cursor::new(&block), 0, 2).unwrap();
        assert_eq!(cd.headers.len(), 2);
        assert_eq!(cd.headers[1].name, b"two");
        assert_eq!(cd.digital_signature.as_deref(), Some(&b"sig"[..]));
        assert_eq!(cd.size, headers_len + 9);
    }

    #[test]
    fn test_bad_header_aborts_directory() {
        let mut block = sample("one").encode().unwrap();
        block.extend(vec![0u8; 60]);
        let err = read_central_directory(&mut Cursor::new(&block), 0, 2).unwrap_err();
        assert!(matches!(err, Error::SignatureMismatch { .. }));
    }
}
