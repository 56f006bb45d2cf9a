//! LZMA codec (method 14).
//!
//! A ZIP LZMA stream starts with its own 4-byte header (LZMA SDK version
//! major and minor, then the properties length as u16) followed by the
//! 5-byte properties (lc/lp/pb byte and dictionary size) and the raw
//! LZMA data. Entries written here always carry an end-of-stream marker,
//! which general-purpose flag bit 1 announces.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::format::reader::ZipOrder;
use crate::{Error, Result};

const SDK_VERSION: [u8; 2] = [9, 20];
const PROPERTIES_LEN: u16 = 5;

/// Length of the ZIP LZMA header plus properties.
pub const HEADER_LEN: u64 = 4 + PROPERTIES_LEN as u64;

/// LZMA decoder.
pub struct LzmaDecoder<R> {
    inner: lzma_rust2::LzmaReader<R>,
}

impl<R> std::fmt::Debug for LzmaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> LzmaDecoder<R> {
    /// Reads the ZIP LZMA header from `input` and prepares the decoder.
    ///
    /// With `end_marker` set the stream is decoded until its end-of-stream
    /// marker; otherwise exactly `uncompressed_size` bytes are produced.
    pub fn new(mut input: R, uncompressed_size: u64, end_marker: bool) -> Result<Self> {
        let mut version = [0u8; 2];
        input.read_exact(&mut version)?;
        let props_len = input.read_u16::<ZipOrder>()?;
        if props_len != PROPERTIES_LEN {
            return Err(Error::InvalidFormat(format!(
                "LZMA properties length {} (expected {})",
                props_len, PROPERTIES_LEN
            )));
        }
        let props_byte = input.read_u8()?;
        let dict_size = input.read_u32::<ZipOrder>()?;

        let unpack_size = if end_marker { u64::MAX } else { uncompressed_size };
        let reader =
            lzma_rust2::LzmaReader::new_with_props(input, unpack_size, props_byte, dict_size, None)
                .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string())))?;

        Ok(Self { inner: reader })
    }
}

impl<R: Read> Read for LzmaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// LZMA encoder.
pub struct LzmaEncoder<W: Write> {
    inner: lzma_rust2::LzmaWriter<W>,
}

impl<W: Write> std::fmt::Debug for LzmaEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> LzmaEncoder<W> {
    /// Writes the ZIP LZMA header and creates an encoder at preset `level`.
    pub fn new(mut output: W, level: u32) -> Result<Self> {
        let options = lzma_rust2::LzmaOptions::with_preset(level.min(9));
        output.write_all(&SDK_VERSION)?;
        output.write_u16::<ZipOrder>(PROPERTIES_LEN)?;
        output.write_u8(options.get_props())?;
        output.write_u32::<ZipOrder>(options.dict_size)?;

        let writer = lzma_rust2::LzmaWriter::new_no_header(output, &options, true)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string())))?;
        Ok(Self { inner: writer })
    }

    /// Writes the end marker and returns the underlying writer.
    pub fn try_finish(self) -> io::Result<W> {
        self.inner
            .finish()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

impl<W: Write> Write for LzmaEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
