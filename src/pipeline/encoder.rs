//! Write side of the entry pipeline: CRC, then compression, then encryption.

use std::io::{self, Write};

#[cfg(feature = "aes")]
use crate::crypto::aes::AesWriter;
use crate::checksum::Crc32Writer;
use crate::codec::{CompressionMethod, CompressionWriter};
#[cfg(feature = "aes")]
use crate::crypto::AesStrength;
use crate::crypto::zipcrypto::ZipCryptoWriter;
use crate::crypto::{EncryptionMethod, Password};
use crate::{Error, Result};

/// Encryption parameters for one entry.
#[derive(Debug, Clone, Copy)]
pub enum Encryption<'a> {
    /// Stored in the clear.
    None,
    /// PKWARE traditional with the given header check byte.
    ZipCrypto {
        /// Password.
        password: &'a Password,
        /// Last byte of the encryption header.
        check: u8,
    },
    /// WinZip AES.
    #[cfg(feature = "aes")]
    Aes {
        /// Password.
        password: &'a Password,
        /// Key strength.
        strength: AesStrength,
    },
}

impl Encryption<'_> {
    /// The method these parameters select.
    pub fn method(&self) -> EncryptionMethod {
        match self {
            Encryption::None => EncryptionMethod::None,
            Encryption::ZipCrypto { .. } => EncryptionMethod::ZipCrypto,
            #[cfg(feature = "aes")]
            Encryption::Aes { strength, .. } => EncryptionMethod::Aes(*strength),
        }
    }
}

/// Encrypting stage; the innermost stage above the sink.
pub enum EncryptionWriter<W: Write> {
    /// No encryption.
    Plain(W),
    /// PKWARE traditional.
    ZipCrypto(ZipCryptoWriter<W>),
    /// WinZip AES.
    #[cfg(feature = "aes")]
    Aes(AesWriter<W>),
}

impl<W: Write> EncryptionWriter<W> {
    /// Writes the encryption header to `inner` and returns the stage, or
    /// the error together with `inner`.
    pub fn new(inner: W, encryption: Encryption<'_>) -> std::result::Result<Self, (Error, W)> {
        Ok(match encryption {
            Encryption::None => Self::Plain(inner),
            Encryption::ZipCrypto { password, check } => {
                Self::ZipCrypto(ZipCryptoWriter::new(inner, password, check)?)
            }
            #[cfg(feature = "aes")]
            Encryption::Aes { password, strength } => {
                Self::Aes(AesWriter::new(inner, password, strength)?)
            }
        })
    }

    /// Emits any buffered tail and trailer, returning the sink.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Plain(w) => Ok(w),
            Self::ZipCrypto(w) => w.finish(),
            #[cfg(feature = "aes")]
            Self::Aes(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for EncryptionWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::ZipCrypto(w) => w.write(buf),
            #[cfg(feature = "aes")]
            Self::Aes(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::ZipCrypto(w) => w.flush(),
            #[cfg(feature = "aes")]
            Self::Aes(w) => w.flush(),
        }
    }
}

/// An entry pipeline that could not be built.
pub struct SetupError<W> {
    /// Why construction failed.
    pub error: Error,
    /// The sink, unless a compression stage had already taken it.
    pub inner: Option<W>,
}

impl<W> SetupError<W> {
    fn returning(error: Error, inner: W) -> Self {
        Self {
            error,
            inner: Some(inner),
        }
    }
}

impl<W> From<SetupError<W>> for Error {
    fn from(e: SetupError<W>) -> Self {
        e.error
    }
}

impl<W> std::fmt::Debug for SetupError<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupError")
            .field("error", &self.error)
            .field("sink_returned", &self.inner.is_some())
            .finish()
    }
}

/// What an entry encoder hands back when it is finished.
#[derive(Debug)]
pub struct EncodedEntry<W> {
    /// The sink, positioned after the entry's last byte.
    pub inner: W,
    /// CRC-32 of the plaintext.
    pub crc32: u32,
    /// Plaintext bytes submitted.
    pub uncompressed_size: u64,
}

/// The composed write pipeline for one entry.
///
/// Bytes written here are checksummed, compressed, then encrypted, and the
/// result lands in the wrapped sink. The compressed size is whatever the
/// sink saw between construction and [`finish`](Self::finish), encryption
/// overhead included; callers measure it from the sink's position.
pub struct EntryEncoder<W: Write> {
    chain: Crc32Writer<CompressionWriter<EncryptionWriter<W>>>,
}

impl<W: Write> EntryEncoder<W> {
    /// Builds the chain over `inner`. Any encryption header is written
    /// immediately.
    ///
    /// Options are checked and encryption is set up before a codec takes
    /// ownership, so those failures return the sink in the error.
    pub fn new(
        inner: W,
        compression: CompressionMethod,
        level: u32,
        encryption: Encryption<'_>,
    ) -> std::result::Result<Self, SetupError<W>> {
        if let Err(e) = Self::check(compression, level, &encryption) {
            return Err(SetupError::returning(e, inner));
        }
        let encrypted = EncryptionWriter::new(inner, encryption)
            .map_err(|(e, inner)| SetupError::returning(e, inner))?;
        let compressed =
            CompressionWriter::new(compression, level, encrypted).map_err(|error| SetupError {
                error,
                inner: None,
            })?;
        Ok(Self {
            chain: Crc32Writer::new(compressed),
        })
    }

    fn check(compression: CompressionMethod, level: u32, encryption: &Encryption<'_>) -> Result<()> {
        compression.ensure_supported()?;
        encryption.method().ensure_supported()?;
        if level > 9 {
            return Err(Error::InvalidCompressionLevel {
                method: compression.id(),
                level,
            });
        }
        Ok(())
    }

    /// Plaintext bytes written so far.
    pub fn bytes_in(&self) -> u64 {
        self.chain.bytes_written()
    }

    /// Running CRC-32 of the plaintext.
    pub fn crc(&self) -> u32 {
        self.chain.crc()
    }

    /// Flushes every stage, outermost first, and returns the sink.
    pub fn finish(self) -> io::Result<EncodedEntry<W>> {
        let crc32 = self.chain.crc();
        let uncompressed_size = self.chain.bytes_written();
        let inner = self.chain.into_inner().finish()?.finish()?;
        Ok(EncodedEntry {
            inner,
            crc32,
            uncompressed_size,
        })
    }
}

impl<W: Write> Write for EntryEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.chain.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.chain.flush()
    }
}

impl<W: Write> std::fmt::Debug for EntryEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryEncoder")
            .field("bytes_in", &self.bytes_in())
            .finish_non_exhaustive()
    }
}
