//! Read side of the entry pipeline: decryption, then decompression, then
//! CRC verification.

use std::io::{self, Read, Take};

#[cfg(feature = "aes")]
use crate::crypto::aes::AesReader;
use crate::checksum::Crc32Reader;
use crate::codec::{CompressionMethod, CompressionReader};
use crate::crypto::zipcrypto::ZipCryptoReader;
use crate::crypto::{EncryptionMethod, Password};
use crate::error::{PasswordDetectionMethod, map_io_error};
use crate::{Error, Result};

/// Everything the decoder needs to know about one entry.
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams<'a> {
    /// Entry name, for error messages.
    pub name: &'a str,
    /// Compression method of the plaintext.
    pub compression: CompressionMethod,
    /// Encryption method.
    pub encryption: EncryptionMethod,
    /// Stored size including encryption overhead.
    pub compressed_size: u64,
    /// Expected plaintext size.
    pub uncompressed_size: u64,
    /// Expected CRC-32; `None` when the archive stores none (AE-2).
    pub crc32: Option<u32>,
    /// Expected last byte of a ZipCrypto header.
    pub check_byte: u8,
    /// LZMA stream ends with an end marker.
    pub lzma_end_marker: bool,
}

/// Decrypting stage; reads raw stored bytes.
pub enum DecryptionReader<R: Read> {
    /// No encryption.
    Plain(R),
    /// PKWARE traditional.
    ZipCrypto(ZipCryptoReader<R>),
    /// WinZip AES.
    #[cfg(feature = "aes")]
    Aes(AesReader<R>),
}

impl<R: Read> DecryptionReader<R> {
    fn new(inner: R, params: &DecodeParams<'_>, password: Option<&Password>) -> Result<Self> {
        if params.encryption == EncryptionMethod::None {
            return Ok(Self::Plain(inner));
        }
        let password = password.ok_or_else(|| Error::PasswordRequired {
            entry_name: params.name.to_string(),
        })?;
        Ok(match params.encryption {
            EncryptionMethod::None => Self::Plain(inner),
            EncryptionMethod::ZipCrypto => Self::ZipCrypto(ZipCryptoReader::new(
                inner,
                password,
                params.check_byte,
                params.name,
            )?),
            #[cfg(feature = "aes")]
            EncryptionMethod::Aes(strength) => Self::Aes(AesReader::new(
                inner,
                password,
                strength,
                params.compressed_size,
                params.name,
            )?),
            #[cfg(not(feature = "aes"))]
            EncryptionMethod::Aes(_) => {
                return Err(Error::UnsupportedMethod {
                    method: crate::crypto::AES_METHOD,
                });
            }
        })
    }
}

impl<R: Read> Read for DecryptionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(r) => r.read(buf),
            Self::ZipCrypto(r) => r.read(buf),
            #[cfg(feature = "aes")]
            Self::Aes(r) => r.read(buf),
        }
    }
}

/// Streaming reader for one entry's plaintext.
///
/// Reading to the end verifies the entry: the AES authentication code as
/// the last ciphertext arrives, then the size and CRC once the decompressor
/// is exhausted. A failed check surfaces as an `io::Error` wrapping the
/// crate [`Error`]; [`map_io_error`] recovers it.
///
/// ZipCrypto's one-byte verifier lets about one wrong password in 256
/// through, so for ZipCrypto entries a corrupt stream or CRC mismatch is
/// reported as [`Error::WrongPassword`].
pub struct EntryDecoder<R: Read> {
    chain: Crc32Reader<CompressionReader<DecryptionReader<Take<R>>>>,
    name: String,
    expected_crc: Option<u32>,
    expected_size: u64,
    weak_password: bool,
    verified: bool,
}

impl<R: Read> EntryDecoder<R> {
    /// Builds the chain over `source`, which must be positioned at the
    /// first stored byte. Encryption headers are read and checked here.
    pub fn new(source: R, params: &DecodeParams<'_>, password: Option<&Password>) -> Result<Self> {
        params.compression.ensure_supported()?;
        params.encryption.ensure_supported()?;
        let limited = source.take(params.compressed_size);
        let decrypted = DecryptionReader::new(limited, params, password)?;
        let decompressed = CompressionReader::new(
            params.compression,
            decrypted,
            params.uncompressed_size,
            params.lzma_end_marker,
        )
        .map_err(|e| match e {
            Error::Io(_) | Error::InvalidFormat(_) | Error::CorruptHeader { .. }
                if params.encryption == EncryptionMethod::ZipCrypto =>
            {
                Error::wrong_password(params.name, PasswordDetectionMethod::DecompressionFailure)
            }
            other => other,
        })?;
        Ok(Self {
            chain: Crc32Reader::new(decompressed),
            name: params.name.to_string(),
            expected_crc: params.crc32,
            expected_size: params.uncompressed_size,
            weak_password: params.encryption == EncryptionMethod::ZipCrypto,
            verified: false,
        })
    }

    /// Plaintext bytes produced so far.
    pub fn bytes_read(&self) -> u64 {
        self.chain.bytes_read()
    }

    fn fail(&self, error: Error) -> io::Error {
        io::Error::other(error)
    }

    fn check_end(&mut self) -> io::Result<()> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;
        let produced = self.chain.bytes_read();
        if produced != self.expected_size {
            let error = if self.weak_password {
                Error::wrong_password(&self.name, PasswordDetectionMethod::DecompressionFailure)
            } else {
                Error::InvalidFormat(format!(
                    "entry '{}' decoded to {} bytes, expected {}",
                    self.name, produced, self.expected_size
                ))
            };
            return Err(self.fail(error));
        }
        if let Some(expected) = self.expected_crc {
            let actual = self.chain.crc();
            if actual != expected {
                let error = if self.weak_password {
                    Error::wrong_password(&self.name, PasswordDetectionMethod::CrcMismatch)
                } else {
                    Error::CrcMismatch {
                        entry_name: self.name.clone(),
                        expected,
                        actual,
                    }
                };
                return Err(self.fail(error));
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for EntryDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match self.chain.read(buf) {
            Ok(n) => n,
            Err(e) => {
                let tunnelled = e.get_ref().is_some_and(|inner| inner.is::<Error>());
                if self.weak_password && !tunnelled {
                    return Err(self.fail(Error::wrong_password(
                        &self.name,
                        PasswordDetectionMethod::DecompressionFailure,
                    )));
                }
                return Err(e);
            }
        };
        if self.chain.bytes_read() > self.expected_size {
            self.verified = true;
            return Err(self.fail(Error::InvalidFormat(format!(
                "entry '{}' decodes past its declared size of {} bytes",
                self.name, self.expected_size
            ))));
        }
        if n == 0 {
            self.check_end()?;
        }
        Ok(n)
    }
}

impl<R: Read> std::fmt::Debug for EntryDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryDecoder")
            .field("name", &self.name)
            .field("bytes_read", &self.bytes_read())
            .field("expected_size", &self.expected_size)
            .finish_non_exhaustive()
    }
}

/// Decodes a complete entry into memory.
pub fn decode_to_vec<R: Read>(
    source: R,
    params: &DecodeParams<'_>,
    password: Option<&Password>,
) -> Result<Vec<u8>> {
    let mut decoder = EntryDecoder::new(source, params, password)?;
    // Cap the pre-allocation; the size comes from the archive.
    let mut out = Vec::with_capacity(params.uncompressed_size.min(1 << 24) as usize);
    decoder.read_to_end(&mut out).map_err(map_io_error)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::zipcrypto;
    use crate::pipeline::encoder::{Encryption, EntryEncoder};
    use std::io::Write;

    fn encode(data: &[u8], method: CompressionMethod, encryption: Encryption<'_>) -> Vec<u8> {
        let mut encoder = EntryEncoder::new(Vec::new(), method, 6, encryption).unwrap();
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap().inner
    }

    fn params<'a>(
        stored: &[u8],
        plain: &[u8],
        compression: CompressionMethod,
        encryption: EncryptionMethod,
        check_byte: u8,
    ) -> DecodeParams<'a> {
        DecodeParams {
            name: "entry",
            compression,
            encryption,
            compressed_size: stored.len() as u64,
            uncompressed_size: plain.len() as u64,
            crc32: Some(crc32fast::hash(plain)),
            check_byte,
            lzma_end_marker: compression == CompressionMethod::Lzma,
        }
    }

    #[test]
    fn test_store_roundtrip() {
        let plain = b"hello, entry pipeline";
        let stored = encode(plain, CompressionMethod::Store, Encryption::None);
        let p = params(&stored, plain, CompressionMethod::Store, EncryptionMethod::None, 0);
        assert_eq!(decode_to_vec(&stored[..], &p, None).unwrap(), plain);
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_deflate_roundtrip_with_trailing_bytes() {
        let plain = b"abcabcabcabcabcabcabcabcabcabc".repeat(20);
        let mut stored = encode(&plain, CompressionMethod::Deflate, Encryption::None);
        let p = params(&stored, &plain, CompressionMethod::Deflate, EncryptionMethod::None, 0);
        stored.extend_from_slice(b"PK\x01\x02 next record");
        assert_eq!(decode_to_vec(&stored[..], &p, None).unwrap(), plain);
    }

    #[test]
    fn test_crc_mismatch_detected() {
        let plain = b"payload";
        let stored = encode(plain, CompressionMethod::Store, Encryption::None);
        let mut p = params(&stored, plain, CompressionMethod::Store, EncryptionMethod::None, 0);
        p.crc32 = Some(0xDEAD_BEEF);
        let err = decode_to_vec(&stored[..], &p, None).unwrap_err();
        assert!(matches!(err, Error::CrcMismatch { expected: 0xDEAD_BEEF, .. }));
    }

    #[test]
    fn test_zipcrypto_wrong_password() {
        let plain = b"secret contents";
        let crc = crc32fast::hash(plain);
        let check = zipcrypto::check_byte(crc, 0, false);
        let password = Password::new("right");
        let stored = encode(
            plain,
            CompressionMethod::Store,
            Encryption::ZipCrypto {
                password: &password,
                check,
            },
        );
        let p = params(&stored, plain, CompressionMethod::Store, EncryptionMethod::ZipCrypto, check);
        assert_eq!(decode_to_vec(&stored[..], &p, Some(&password)).unwrap(), plain);

        // Any failure under a wrong password is reported as such, whether
        // the verifier byte or the CRC catches it.
        for attempt in ["wrong", "Right", "right!", "x"] {
            let err = decode_to_vec(&stored[..], &p, Some(&Password::new(attempt))).unwrap_err();
            assert!(
                matches!(err, Error::WrongPassword { .. }),
                "{}: {:?}",
                attempt,
                err
            );
        }
    }

    #[test]
    fn test_missing_password() {
        let stored = vec![0u8; 20];
        let p = params(&stored, b"", CompressionMethod::Store, EncryptionMethod::ZipCrypto, 0);
        assert!(matches!(
            decode_to_vec(&stored[..], &p, None),
            Err(Error::PasswordRequired { .. })
        ));
    }

    #[cfg(feature = "aes")]
    #[test]
    fn test_aes_wrong_password_before_plaintext() {
        use crate::crypto::AesStrength;
        let plain = b"top secret".repeat(50);
        let password = Password::new("correct horse");
        let strength = AesStrength::Aes256;
        let stored = encode(
            &plain,
            CompressionMethod::Store,
            Encryption::Aes {
                password: &password,
                strength,
            },
        );
        let mut p = params(&stored, &plain, CompressionMethod::Store, EncryptionMethod::Aes(strength), 0);
        p.crc32 = None;
        assert_eq!(decode_to_vec(&stored[..], &p, Some(&password)).unwrap(), plain);

        let err = decode_to_vec(&stored[..], &p, Some(&Password::new("correct horsf"))).unwrap_err();
        assert!(matches!(err, Error::WrongPassword { .. }), "{:?}", err);
    }

    #[test]
    fn test_declared_size_enforced() {
        let plain = b"0123456789";
        let stored = encode(plain, CompressionMethod::Store, Encryption::None);
        let mut p = params(&stored, plain, CompressionMethod::Store, EncryptionMethod::None, 0);
        p.uncompressed_size = 4;
        p.crc32 = None;
        assert!(matches!(
            decode_to_vec(&stored[..], &p, None),
            Err(Error::InvalidFormat(_))
        ));
    }
}
