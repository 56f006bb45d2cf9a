//! End-of-Central-Directory records and the backward trailer scan.
//!
//! Every archive ends with an End-of-Central-Directory (EOCD) record. When
//! any archive-level value overflows its classic field, the EOCD is preceded
//! by a ZIP64 EOCD record and a ZIP64 locator pointing at it; the classic
//! EOCD then holds sentinels for exactly the overflowing fields.

use std::io::{Read, Seek, SeekFrom};

use byteorder::WriteBytesExt;

use super::reader::{
    ZipOrder, expect_signature, get_u16, get_u32, get_u64, put_len16, read_fixed,
};
use super::zip64::{SENTINEL_U16, SENTINEL_U32, exceeds_u16, exceeds_u32};
use super::{
    EOCD_SIGNATURE, EOCD_SIZE, MAX_COMMENT_LEN, ZIP64_EOCD_SIGNATURE, ZIP64_EOCD_SIZE,
    ZIP64_LOCATOR_SIGNATURE, ZIP64_LOCATOR_SIZE, version,
};
use crate::{Error, Result};

/// Archive-level values, independent of how they are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrailerValues {
    /// Number of the disk holding the EOCD (0-based; the last disk).
    pub disk_number: u32,
    /// Number of the disk where the central directory starts.
    pub cd_start_disk: u32,
    /// Central directory entries on the EOCD's disk.
    pub entries_on_disk: u64,
    /// Central directory entries in total.
    pub total_entries: u64,
    /// Central directory size in bytes.
    pub cd_size: u64,
    /// Central directory offset relative to the start of `cd_start_disk`.
    pub cd_offset: u64,
}

impl TrailerValues {
    /// Returns true if any value overflows its classic EOCD field.
    pub fn needs_zip64(&self) -> bool {
        exceeds_u16(self.disk_number as u64)
            || exceeds_u16(self.cd_start_disk as u64)
            || exceeds_u16(self.entries_on_disk)
            || exceeds_u16(self.total_entries)
            || exceeds_u32(self.cd_size)
            || exceeds_u32(self.cd_offset)
    }
}

/// The classic End-of-Central-Directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub cd_start_disk: u16,
    /// Entries on this disk.
    pub entries_on_disk: u16,
    /// Total entries.
    pub total_entries: u16,
    /// Central directory size.
    pub cd_size: u32,
    /// Central directory offset on its starting disk.
    pub cd_offset: u32,
    /// Archive comment.
    pub comment: Vec<u8>,
}

fn clamp16(value: u64) -> u16 {
    if exceeds_u16(value) {
        SENTINEL_U16
    } else {
        value as u16
    }
}

fn clamp32(value: u64) -> u32 {
    if exceeds_u32(value) {
        SENTINEL_U32
    } else {
        value as u32
    }
}

impl EndOfCentralDirectory {
    /// Builds the record, writing sentinels for each overflowing value.
    pub fn from_values(values: &TrailerValues, comment: Vec<u8>) -> Self {
        Self {
            disk_number: clamp16(values.disk_number as u64),
            cd_start_disk: clamp16(values.cd_start_disk as u64),
            entries_on_disk: clamp16(values.entries_on_disk),
            total_entries: clamp16(values.total_entries),
            cd_size: clamp32(values.cd_size),
            cd_offset: clamp32(values.cd_offset),
            comment,
        }
    }

    /// Values as stored, without ZIP64 resolution.
    pub fn values(&self) -> TrailerValues {
        TrailerValues {
            disk_number: self.disk_number as u32,
            cd_start_disk: self.cd_start_disk as u32,
            entries_on_disk: self.entries_on_disk as u64,
            total_entries: self.total_entries as u64,
            cd_size: self.cd_size as u64,
            cd_offset: self.cd_offset as u64,
        }
    }

    /// Parses the record from a buffer that starts at its signature.
    pub fn parse(buf: &[u8], offset: u64) -> Result<Self> {
        if buf.len() < EOCD_SIZE as usize {
            return Err(Error::corrupt_header(offset, "truncated end of central directory"));
        }
        let mut b = buf;
        expect_signature(&mut b, EOCD_SIGNATURE, offset)?;
        let disk_number = get_u16(&mut b)?;
        let cd_start_disk = get_u16(&mut b)?;
        let entries_on_disk = get_u16(&mut b)?;
        let total_entries = get_u16(&mut b)?;
        let cd_size = get_u32(&mut b)?;
        let cd_offset = get_u32(&mut b)?;
        let comment_len = get_u16(&mut b)? as usize;
        // A truncated comment is tolerated; it is purely cosmetic.
        let comment = b[..comment_len.min(b.len())].to_vec();
        Ok(Self {
            disk_number,
            cd_start_disk,
            entries_on_disk,
            total_entries,
            cd_size,
            cd_offset,
            comment,
        })
    }

    /// Serializes the record.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(EOCD_SIZE as usize + self.comment.len());
        out.write_u32::<ZipOrder>(EOCD_SIGNATURE)?;
        out.write_u16::<ZipOrder>(self.disk_number)?;
        out.write_u16::<ZipOrder>(self.cd_start_disk)?;
        out.write_u16::<ZipOrder>(self.entries_on_disk)?;
        out.write_u16::<ZipOrder>(self.total_entries)?;
        out.write_u32::<ZipOrder>(self.cd_size)?;
        out.write_u32::<ZipOrder>(self.cd_offset)?;
        put_len16(&mut out, self.comment.len(), "archive comment")?;
        out.extend_from_slice(&self.comment);
        Ok(out)
    }
}

/// The ZIP64 End-of-Central-Directory record (version 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    /// Version made by.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// Archive-level values, all stored in full width.
    pub values: TrailerValues,
    /// Extensible data sector, preserved verbatim.
    pub extensible_data: Vec<u8>,
}

impl Zip64EndOfCentralDirectory {
    /// Creates a record for `values`.
    pub fn new(values: TrailerValues) -> Self {
        Self {
            version_made_by: version::MADE_BY,
            version_needed: version::ZIP64,
            values,
            extensible_data: Vec::new(),
        }
    }

    /// Reads the record at absolute `offset`.
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;
        let buf = read_fixed(reader, ZIP64_EOCD_SIZE as usize, offset, "ZIP64 end of central directory")?;
        let mut b = &buf[..];
        expect_signature(&mut b, ZIP64_EOCD_SIGNATURE, offset)?;
        let record_size = get_u64(&mut b)?;
        let version_made_by = get_u16(&mut b)?;
        let version_needed = get_u16(&mut b)?;
        let disk_number = get_u32(&mut b)?;
        let cd_start_disk = get_u32(&mut b)?;
        let entries_on_disk = get_u64(&mut b)?;
        let total_entries = get_u64(&mut b)?;
        let cd_size = get_u64(&mut b)?;
        let cd_offset = get_u64(&mut b)?;

        let extensible_len = record_size
            .checked_sub(ZIP64_EOCD_SIZE - 12)
            .ok_or_else(|| Error::corrupt_header(offset, "ZIP64 EOCD record size too small"))?;
        if extensible_len > MAX_COMMENT_LEN as u64 {
            return Err(Error::corrupt_header(
                offset,
                format!("implausible ZIP64 extensible data length {}", extensible_len),
            ));
        }
        let extensible_data = read_fixed(reader, extensible_len as usize, offset, "ZIP64 extensible data")?;

        Ok(Self {
            version_made_by,
            version_needed,
            values: TrailerValues {
                disk_number,
                cd_start_disk,
                entries_on_disk,
                total_entries,
                cd_size,
                cd_offset,
            },
            extensible_data,
        })
    }

    /// Serializes the record.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(ZIP64_EOCD_SIZE as usize + self.extensible_data.len());
        out.write_u32::<ZipOrder>(ZIP64_EOCD_SIGNATURE)?;
        out.write_u64::<ZipOrder>(ZIP64_EOCD_SIZE - 12 + self.extensible_data.len() as u64)?;
        out.write_u16::<ZipOrder>(self.version_made_by)?;
        out.write_u16::<ZipOrder>(self.version_needed)?;
        out.write_u32::<ZipOrder>(self.values.disk_number)?;
        out.write_u32::<ZipOrder>(self.values.cd_start_disk)?;
        out.write_u64::<ZipOrder>(self.values.entries_on_disk)?;
        out.write_u64::<ZipOrder>(self.values.total_entries)?;
        out.write_u64::<ZipOrder>(self.values.cd_size)?;
        out.write_u64::<ZipOrder>(self.values.cd_offset)?;
        out.extend_from_slice(&self.extensible_data);
        Ok(out)
    }
}

/// The ZIP64 End-of-Central-Directory Locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64Locator {
    /// Disk holding the ZIP64 EOCD record.
    pub zip64_eocd_disk: u32,
    /// Offset of the ZIP64 EOCD record relative to the start of that disk.
    pub zip64_eocd_offset: u64,
    /// Total number of disks.
    pub total_disks: u32,
}

impl Zip64Locator {
    /// Parses the locator from a 20-byte buffer.
    pub fn parse(buf: &[u8], offset: u64) -> Result<Self> {
        let mut b = buf;
        expect_signature(&mut b, ZIP64_LOCATOR_SIGNATURE, offset)?;
        Ok(Self {
            zip64_eocd_disk: get_u32(&mut b)?,
            zip64_eocd_offset: get_u64(&mut b)?,
            total_disks: get_u32(&mut b)?,
        })
    }

    /// Serializes the locator.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(ZIP64_LOCATOR_SIZE as usize);
        out.write_u32::<ZipOrder>(ZIP64_LOCATOR_SIGNATURE)?;
        out.write_u32::<ZipOrder>(self.zip64_eocd_disk)?;
        out.write_u64::<ZipOrder>(self.zip64_eocd_offset)?;
        out.write_u32::<ZipOrder>(self.total_disks)?;
        Ok(out)
    }
}

/// The resolved archive trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Absolute offset of the classic EOCD.
    pub eocd_offset: u64,
    /// The classic EOCD as stored.
    pub eocd: EndOfCentralDirectory,
    /// The ZIP64 locator and record, if present.
    pub zip64: Option<(Zip64Locator, Zip64EndOfCentralDirectory)>,
}

impl Trailer {
    /// Effective archive-level values: the ZIP64 record's when present.
    pub fn values(&self) -> TrailerValues {
        match &self.zip64 {
            Some((_, record)) => record.values,
            None => self.eocd.values(),
        }
    }

    /// Total number of disks the trailer declares.
    pub fn total_disks(&self) -> u32 {
        match &self.zip64 {
            Some((locator, _)) => locator.total_disks.max(1),
            None => self.eocd.disk_number as u32 + 1,
        }
    }

    /// Archive comment.
    pub fn comment(&self) -> &[u8] {
        &self.eocd.comment
    }
}

/// Scans backward from the end of the input for the EOCD signature.
///
/// The search is bounded by the longest possible comment. A candidate whose
/// declared comment ends exactly at end of input wins, which rejects
/// signature bytes occurring inside a comment; failing that, the last
/// candidate whose comment fits is used (archives with trailing garbage).
pub fn find_eocd<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < EOCD_SIZE {
        return Err(Error::InvalidFormat(format!(
            "{} bytes is too short for a ZIP archive",
            len
        )));
    }
    let window = len.min(EOCD_SIZE + MAX_COMMENT_LEN as u64);
    let start = len - window;
    reader.seek(SeekFrom::Start(start))?;
    let buf = read_fixed(reader, window as usize, start, "archive trailer")?;

    let signature = EOCD_SIGNATURE.to_le_bytes();
    let last = buf.len() - EOCD_SIZE as usize;
    let mut fallback = None;
    for pos in (0..=last).rev() {
        if buf[pos..pos + 4] != signature {
            continue;
        }
        let comment_len = u16::from_le_bytes([buf[pos + 20], buf[pos + 21]]) as usize;
        let end = pos + EOCD_SIZE as usize + comment_len;
        if end == buf.len() {
            return Ok(start + pos as u64);
        }
        if end < buf.len() && fallback.is_none() {
            fallback = Some(start + pos as u64);
        }
    }
    fallback.ok_or_else(|| {
        Error::InvalidFormat("end of central directory record not found".into())
    })
}

/// Locates and parses the complete trailer.
///
/// `resolve` maps a `(disk, offset-on-disk)` pair to an absolute position;
/// the ZIP64 locator addresses its record that way.
pub fn read_trailer<R, F>(reader: &mut R, resolve: F) -> Result<Trailer>
where
    R: Read + Seek,
    F: Fn(u32, u64) -> Result<u64>,
{
    let eocd_offset = find_eocd(reader)?;
    reader.seek(SeekFrom::Start(eocd_offset))?;
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(EOCD_SIZE + MAX_COMMENT_LEN as u64)
        .read_to_end(&mut buf)?;
    let eocd = EndOfCentralDirectory::parse(&buf, eocd_offset)?;

    let mut zip64 = None;
    if eocd_offset >= ZIP64_LOCATOR_SIZE {
        let locator_offset = eocd_offset - ZIP64_LOCATOR_SIZE;
        reader.seek(SeekFrom::Start(locator_offset))?;
        let buf = read_fixed(reader, ZIP64_LOCATOR_SIZE as usize, locator_offset, "ZIP64 locator")?;
        if buf[..4] == ZIP64_LOCATOR_SIGNATURE.to_le_bytes() {
            let locator = Zip64Locator::parse(&buf, locator_offset)?;
            let record_offset = resolve(locator.zip64_eocd_disk, locator.zip64_eocd_offset)?;
            let record = Zip64EndOfCentralDirectory::read(reader, record_offset)?;
            zip64 = Some((locator, record));
        }
    }

    Ok(Trailer {
        eocd_offset,
        eocd,
        zip64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn values() -> TrailerValues {
        TrailerValues {
            disk_number: 0,
            cd_start_disk: 0,
            entries_on_disk: 3,
            total_entries: 3,
            cd_size: 150,
            cd_offset: 1000,
        }
    }

    #[test]
    fn test_eocd_roundtrip() {
        let eocd = EndOfCentralDirectory::from_values(&values(), b"hi".to_vec());
        let bytes = eocd.encode().unwrap();
        assert_eq!(bytes.len(), 24);
        let parsed = EndOfCentralDirectory::parse(&bytes, 0).unwrap();
        assert_eq!(parsed, eocd);
        assert_eq!(parsed.values(), values());
    }

    #[test]
    fn test_only_overflowing_fields_get_sentinels() {
        let mut v = values();
        v.total_entries = 70_000;
        v.entries_on_disk = 70_000;
        assert!(v.needs_zip64());
        let eocd = EndOfCentralDirectory::from_values(&v, Vec::new());
        assert_eq!(eocd.total_entries, 0xFFFF);
        assert_eq!(eocd.cd_offset, 1000);
        assert_eq!(eocd.cd_size, 150);
    }

    #[test]
    fn test_find_eocd_with_comment_containing_signature() {
        let mut comment = b"xx".to_vec();
        comment.extend(EOCD_SIGNATURE.to_le_bytes());
        comment.extend([0u8; 30]);
        let mut archive = vec![0u8; 10];
        archive.extend(
            EndOfCentralDirectory::from_values(&values(), comment)
                .encode()
                .unwrap(),
        );
        let pos = find_eocd(&mut Cursor::new(&archive)).unwrap();
        assert_eq!(pos, 10);
    }

    #[test]
    fn test_find_eocd_missing() {
        let err = find_eocd(&mut Cursor::new(vec![0u8; 100])).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
        let err = find_eocd(&mut Cursor::new(vec![0u8; 4])).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_read_trailer_with_zip64() {
        let mut v = values();
        v.cd_offset = 0x1_0000_0000;
        let mut archive = vec![0u8; 16];
        let record_offset = archive.len() as u64;
        archive.extend(Zip64EndOfCentralDirectory::new(v).encode().unwrap());
        archive.extend(
            Zip64Locator {
                zip64_eocd_disk: 0,
                zip64_eocd_offset: record_offset,
                total_disks: 1,
            }
            .encode()
            .unwrap(),
        );
        archive.extend(
            EndOfCentralDirectory::from_values(&v, Vec::new())
                .encode()
                .unwrap(),
        );

        let trailer = read_trailer(&mut Cursor::new(&archive), |_, off| Ok(off)).unwrap();
        assert!(trailer.zip64.is_some());
        assert_eq!(trailer.eocd.cd_offset, SENTINEL_U32);
        assert_eq!(trailer.values(), v);
        assert_eq!(trailer.total_disks(), 1);
    }

    #[test]
    fn test_read_trailer_without_zip64() {
        let archive = EndOfCentralDirectory::from_values(&values(), b"c".to_vec())
            .encode()
            .unwrap();
        let trailer = read_trailer(&mut Cursor::new(&archive), |_, off| Ok(off)).unwrap();
        assert!(trailer.zip64.is_none());
        assert_eq!(trailer.comment(), b"c");
        assert_eq!(trailer.values(), values());
    }
}
