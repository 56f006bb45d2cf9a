//! Binary primitives shared by the record codecs.
//!
//! Every multi-byte ZIP integer is unsigned little-endian. Records are read
//! in two steps: the fixed-size part is pulled into a buffer with
//! [`read_fixed`], then decoded with `byteorder` from a cursor, so a short
//! read surfaces once, with the record's offset, instead of per field.

use std::io::{self, Read};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

/// Byte order of every integer in a ZIP archive.
pub type ZipOrder = byteorder::LittleEndian;

/// Turns an I/O failure while reading a record into a crate error.
///
/// A premature end of input means the record is truncated, which is a
/// format error at `offset`; anything else is passed through as I/O.
pub(crate) fn truncated(err: io::Error, offset: u64, what: &str) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::corrupt_header(offset, format!("truncated {}", what))
    } else {
        Error::Io(err)
    }
}

/// Reads exactly `len` bytes belonging to the record at `offset`.
pub fn read_fixed<R: Read>(r: &mut R, len: usize, offset: u64, what: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|e| truncated(e, offset, what))?;
    Ok(buf)
}

/// Reads a 4-byte signature and verifies it.
///
/// Fails with [`Error::SignatureMismatch`] carrying both values and the
/// record's offset.
pub fn expect_signature<R: Read>(r: &mut R, expected: u32, offset: u64) -> Result<()> {
    let found = r
        .read_u32::<ZipOrder>()
        .map_err(|e| truncated(e, offset, "record signature"))?;
    check_signature(found, expected, offset)
}

/// Verifies an already-read signature.
pub fn check_signature(found: u32, expected: u32, offset: u64) -> Result<()> {
    if found != expected {
        return Err(Error::SignatureMismatch {
            expected,
            found,
            offset,
        });
    }
    Ok(())
}

/// Reads a little-endian `u16` from a record buffer.
pub fn get_u16(buf: &mut &[u8]) -> io::Result<u16> {
    buf.read_u16::<ZipOrder>()
}

/// Reads a little-endian `u32` from a record buffer.
pub fn get_u32(buf: &mut &[u8]) -> io::Result<u32> {
    buf.read_u32::<ZipOrder>()
}

/// Reads a little-endian `u64` from a record buffer.
pub fn get_u64(buf: &mut &[u8]) -> io::Result<u64> {
    buf.read_u64::<ZipOrder>()
}

/// Writes a `u16` length prefix for a variable field, rejecting overlong data.
pub fn put_len16<W: io::Write>(w: &mut W, len: usize, what: &str) -> io::Result<()> {
    let len = u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} longer than 65535 bytes", what),
        )
    })?;
    w.write_u16::<ZipOrder>(len)
}
