//! Compression codecs for ZIP entries.
//!
//! Each supported method has an encoder/decoder pair in its own module,
//! gated by a cargo feature. [`CompressionWriter`] and
//! [`CompressionReader`] dispatch over them so the entry pipeline can
//! treat every method as a plain `Write`/`Read` stage.
//!
//! | Method  | ID | Feature   |
//! |---------|----|-----------|
//! | Store   | 0  | always    |
//! | Deflate | 8  | `deflate` |
//! | BZip2   | 12 | `bzip2`   |
//! | LZMA    | 14 | `lzma`    |
//! | Zstd    | 93 | `zstd`    |

#[cfg(feature = "bzip2")]
pub mod bzip2;
#[cfg(feature = "deflate")]
pub mod deflate;
#[cfg(feature = "lzma")]
pub mod lzma;
#[cfg(feature = "zstd")]
pub mod zstd;

use std::io::{self, Read, Write};

use crate::format::version;
use crate::{Error, Result};

/// Default compression level on the 0-9 scale.
pub const DEFAULT_LEVEL: u32 = 6;

/// Compression method of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CompressionMethod {
    /// No compression.
    Store,
    /// Raw deflate.
    #[default]
    Deflate,
    /// BZip2.
    Bzip2,
    /// LZMA with the ZIP properties header.
    Lzma,
    /// Zstandard.
    Zstd,
}

impl CompressionMethod {
    /// The method ID stored in headers.
    pub fn id(self) -> u16 {
        match self {
            Self::Store => 0,
            Self::Deflate => 8,
            Self::Bzip2 => 12,
            Self::Lzma => 14,
            Self::Zstd => 93,
        }
    }

    /// Parses a method ID.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(Self::Store),
            8 => Some(Self::Deflate),
            12 => Some(Self::Bzip2),
            14 => Some(Self::Lzma),
            93 => Some(Self::Zstd),
            _ => None,
        }
    }

    /// Minimum "version needed to extract" for this method.
    pub fn version_needed(self) -> u16 {
        match self {
            Self::Store | Self::Deflate => version::DEFAULT,
            Self::Bzip2 => version::BZIP2,
            Self::Lzma | Self::Zstd => version::LZMA,
        }
    }

    /// Returns true if this build was compiled with support for the method.
    pub fn is_supported(self) -> bool {
        match self {
            Self::Store => true,
            Self::Deflate => cfg!(feature = "deflate"),
            Self::Bzip2 => cfg!(feature = "bzip2"),
            Self::Lzma => cfg!(feature = "lzma"),
            Self::Zstd => cfg!(feature = "zstd"),
        }
    }

    /// Returns an error if the method's feature is disabled.
    pub fn ensure_supported(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(Error::UnsupportedMethod { method: self.id() })
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Store => "store",
            Self::Deflate => "deflate",
            Self::Bzip2 => "bzip2",
            Self::Lzma => "lzma",
            Self::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// Compressing stage of the write pipeline.
pub enum CompressionWriter<W: Write> {
    /// Pass-through.
    Store(W),
    /// Deflate encoder.
    #[cfg(feature = "deflate")]
    Deflate(deflate::DeflateEncoder<W>),
    /// BZip2 encoder.
    #[cfg(feature = "bzip2")]
    Bzip2(bzip2::Bzip2Encoder<W>),
    /// LZMA encoder.
    #[cfg(feature = "lzma")]
    Lzma(lzma::LzmaEncoder<W>),
    /// Zstd encoder.
    #[cfg(feature = "zstd")]
    Zstd(zstd::ZstdStreamEncoder<W>),
}

impl<W: Write> std::fmt::Debug for CompressionWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CompressionWriter").field(&self.method()).finish()
    }
}

impl<W: Write> CompressionWriter<W> {
    /// Creates the encoder for `method` on top of `output`.
    pub fn new(method: CompressionMethod, level: u32, output: W) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidCompressionLevel {
                method: method.id(),
                level,
            });
        }
        Ok(match method {
            CompressionMethod::Store => Self::Store(output),
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflate => Self::Deflate(deflate::DeflateEncoder::new(output, level)),
            #[cfg(feature = "bzip2")]
            CompressionMethod::Bzip2 => Self::Bzip2(bzip2::Bzip2Encoder::new(output, level)),
            #[cfg(feature = "lzma")]
            CompressionMethod::Lzma => Self::Lzma(lzma::LzmaEncoder::new(output, level)?),
            #[cfg(feature = "zstd")]
            CompressionMethod::Zstd => Self::Zstd(zstd::ZstdStreamEncoder::new(output, level)?),
            #[allow(unreachable_patterns)]
            other => return Err(Error::UnsupportedMethod { method: other.id() }),
        })
    }

    /// The method this stage encodes.
    pub fn method(&self) -> CompressionMethod {
        match self {
            Self::Store(_) => CompressionMethod::Store,
            #[cfg(feature = "deflate")]
            Self::Deflate(_) => CompressionMethod::Deflate,
            #[cfg(feature = "bzip2")]
            Self::Bzip2(_) => CompressionMethod::Bzip2,
            #[cfg(feature = "lzma")]
            Self::Lzma(_) => CompressionMethod::Lzma,
            #[cfg(feature = "zstd")]
            Self::Zstd(_) => CompressionMethod::Zstd,
        }
    }

    /// Flushes the encoder's final output and returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Store(w) => Ok(w),
            #[cfg(feature = "deflate")]
            Self::Deflate(e) => e.try_finish(),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(e) => e.try_finish(),
            #[cfg(feature = "lzma")]
            Self::Lzma(e) => e.try_finish(),
            #[cfg(feature = "zstd")]
            Self::Zstd(e) => e.try_finish(),
        }
    }
}

impl<W: Write> Write for CompressionWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Store(w) => w.write(buf),
            #[cfg(feature = "deflate")]
            Self::Deflate(e) => e.write(buf),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(e) => e.write(buf),
            #[cfg(feature = "lzma")]
            Self::Lzma(e) => e.write(buf),
            #[cfg(feature = "zstd")]
            Self::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Store(w) => w.flush(),
            #[cfg(feature = "deflate")]
            Self::Deflate(e) => e.flush(),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(e) => e.flush(),
            #[cfg(feature = "lzma")]
            Self::Lzma(e) => e.flush(),
            #[cfg(feature = "zstd")]
            Self::Zstd(e) => e.flush(),
        }
    }
}

/// Decompressing stage of the read pipeline.
pub enum CompressionReader<R: Read> {
    /// Pass-through.
    Store(R),
    /// Deflate decoder.
    #[cfg(feature = "deflate")]
    Deflate(deflate::DeflateDecoder<R>),
    /// BZip2 decoder.
    #[cfg(feature = "bzip2")]
    Bzip2(bzip2::Bzip2Decoder<R>),
    /// LZMA decoder.
    #[cfg(feature = "lzma")]
    Lzma(lzma::LzmaDecoder<R>),
    /// Zstd decoder.
    #[cfg(feature = "zstd")]
    Zstd(zstd::ZstdStreamDecoder<R>),
}

impl<R: Read> std::fmt::Debug for CompressionReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionReader").finish_non_exhaustive()
    }
}

impl<R: Read> CompressionReader<R> {
    /// Creates the decoder for `method` over `input`.
    ///
    /// `lzma_end_marker` reflects general-purpose flag bit 1 and only
    /// matters for LZMA.
    #[allow(unused_variables)]
    pub fn new(
        method: CompressionMethod,
        input: R,
        uncompressed_size: u64,
        lzma_end_marker: bool,
    ) -> Result<Self> {
        Ok(match method {
            CompressionMethod::Store => Self::Store(input),
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflate => Self::Deflate(deflate::DeflateDecoder::new(input)),
            #[cfg(feature = "bzip2")]
            CompressionMethod::Bzip2 => Self::Bzip2(bzip2::Bzip2Decoder::new(input)),
            #[cfg(feature = "lzma")]
            CompressionMethod::Lzma => Self::Lzma(lzma::LzmaDecoder::new(
                input,
                uncompressed_size,
                lzma_end_marker,
            )?),
            #[cfg(feature = "zstd")]
            CompressionMethod::Zstd => Self::Zstd(zstd::ZstdStreamDecoder::new(input)?),
            #[allow(unreachable_patterns)]
            other => return Err(Error::UnsupportedMethod { method: other.id() }),
        })
    }
}

impl<R: Read> Read for CompressionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Store(r) => r.read(buf),
            #[cfg(feature = "deflate")]
            Self::Deflate(d) => d.read(buf),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(d) => d.read(buf),
            #[cfg(feature = "lzma")]
            Self::Lzma(d) => d.read(buf),
            #[cfg(feature = "zstd")]
            Self::Zstd(d) => d.read(buf),
        }
    }
}
