//! Zstandard codec (method 93).

use std::io::{self, BufReader, Read, Write};

use zstd::stream::{Decoder as ZstdDecoder, Encoder as ZstdEncoderInner};

// Maps the 0-9 level scale onto zstd's 1-22 range.
const LEVEL_MAP: [i32; 10] = [1, 1, 2, 3, 5, 7, 9, 12, 15, 19];

/// Converts a 0-9 compression level to a zstd level.
pub fn zstd_level(level: u32) -> i32 {
    LEVEL_MAP[level.min(9) as usize]
}

/// ZSTD decoder.
pub struct ZstdStreamDecoder<R: Read> {
    inner: ZstdDecoder<'static, BufReader<R>>,
}

impl<R: Read> std::fmt::Debug for ZstdStreamDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdStreamDecoder").finish_non_exhaustive()
    }
}

impl<R: Read> ZstdStreamDecoder<R> {
    /// Creates a new ZSTD decoder.
    pub fn new(input: R) -> io::Result<Self> {
        Ok(Self {
            inner: ZstdDecoder::new(input)?,
        })
    }
}

impl<R: Read> Read for ZstdStreamDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// ZSTD encoder.
pub struct ZstdStreamEncoder<W: Write> {
    inner: ZstdEncoderInner<'static, W>,
}

impl<W: Write> std::fmt::Debug for ZstdStreamEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdStreamEncoder").finish_non_exhaustive()
    }
}

impl<W: Write> ZstdStreamEncoder<W> {
    /// Creates a new encoder at a 0-9 level.
    pub fn new(output: W, level: u32) -> io::Result<Self> {
        Ok(Self {
            inner: ZstdEncoderInner::new(output, zstd_level(level))?,
        })
    }

    /// Finishes the frame and returns the underlying writer.
    pub fn try_finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write> Write for ZstdStreamEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
