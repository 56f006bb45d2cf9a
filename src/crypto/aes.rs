//! WinZip AES encryption (AE-1 and AE-2).
//!
//! Layout of an encrypted entry's data:
//!
//! ```text
//! salt (8/12/16) | verifier (2) | ciphertext | HMAC-SHA1 (first 10 bytes)
//! ```
//!
//! PBKDF2-HMAC-SHA1 with 1000 iterations stretches the password into the
//! AES key, the HMAC key and the verifier. The cipher is AES in CTR mode
//! with a little-endian block counter starting at 1. The MAC covers the
//! ciphertext.

use std::io::{self, Read, Write};

use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

use super::{AES_AUTH_CODE_LEN, AES_VERIFIER_LEN, AesStrength, Password, random_bytes};
use crate::error::PasswordDetectionMethod;
use crate::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

const PBKDF2_ITERATIONS: u32 = 1000;
const BLOCK_SIZE: usize = 16;
const VERIFIER_LEN: usize = AES_VERIFIER_LEN as usize;
const AUTH_CODE_LEN: usize = AES_AUTH_CODE_LEN as usize;

struct DerivedKeys {
    encryption: Zeroizing<Vec<u8>>,
    authentication: Zeroizing<Vec<u8>>,
    verifier: [u8; VERIFIER_LEN],
}

fn derive_keys(password: &Password, salt: &[u8], strength: AesStrength) -> DerivedKeys {
    let key_len = strength.key_len();
    let mut out = Zeroizing::new(vec![0u8; key_len * 2 + VERIFIER_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
    let mut verifier = [0u8; VERIFIER_LEN];
    verifier.copy_from_slice(&out[key_len * 2..]);
    DerivedKeys {
        encryption: Zeroizing::new(out[..key_len].to_vec()),
        authentication: Zeroizing::new(out[key_len..key_len * 2].to_vec()),
        verifier,
    }
}

type Aes128Ctr = ctr::Ctr128LE<aes::Aes128>;
type Aes192Ctr = ctr::Ctr128LE<aes::Aes192>;
type Aes256Ctr = ctr::Ctr128LE<aes::Aes256>;

/// WinZip counter: little-endian, first block numbered 1.
const INITIAL_COUNTER: [u8; BLOCK_SIZE] = {
    let mut iv = [0u8; BLOCK_SIZE];
    iv[0] = 1;
    iv
};

/// AES-CTR keystream for the entry's key strength.
enum AesCtr {
    Aes128(Aes128Ctr),
    Aes192(Aes192Ctr),
    Aes256(Aes256Ctr),
}

impl AesCtr {
    fn new(strength: AesStrength, key: &[u8]) -> Result<Self> {
        let invalid = |_| Error::CryptoError("invalid AES key length".into());
        let iv = &INITIAL_COUNTER[..];
        Ok(match strength {
            AesStrength::Aes128 => Self::Aes128(Aes128Ctr::new_from_slices(key, iv).map_err(invalid)?),
            AesStrength::Aes192 => Self::Aes192(Aes192Ctr::new_from_slices(key, iv).map_err(invalid)?),
            AesStrength::Aes256 => Self::Aes256(Aes256Ctr::new_from_slices(key, iv).map_err(invalid)?),
        })
    }

    fn apply(&mut self, data: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.apply_keystream(data),
            Self::Aes192(c) => c.apply_keystream(data),
            Self::Aes256(c) => c.apply_keystream(data),
        }
    }
}

fn new_mac(key: &[u8]) -> Result<HmacSha1> {
    <HmacSha1 as Mac>::new_from_slice(key)
        .map_err(|_| Error::CryptoError("invalid HMAC key length".into()))
}

/// Encrypting writer.
///
/// Call [`finish`](AesWriter::finish) to append the authentication code.
pub struct AesWriter<W> {
    inner: W,
    ctr: AesCtr,
    mac: HmacSha1,
    scratch: Vec<u8>,
}

impl<W> std::fmt::Debug for AesWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesWriter").finish_non_exhaustive()
    }
}

impl<W: Write> AesWriter<W> {
    /// Generates a salt, writes salt and verifier, and returns the writer.
    ///
    /// On failure `inner` is handed back with the error.
    pub fn new(
        mut inner: W,
        password: &Password,
        strength: AesStrength,
    ) -> std::result::Result<Self, (Error, W)> {
        let (prefix, ctr, mac) = match Self::prepare(password, strength) {
            Ok(prepared) => prepared,
            Err(e) => return Err((e, inner)),
        };
        if let Err(e) = inner.write_all(&prefix) {
            return Err((e.into(), inner));
        }
        Ok(Self {
            inner,
            ctr,
            mac,
            scratch: Vec::new(),
        })
    }

    /// Salt and verifier, plus the keyed cipher and MAC.
    fn prepare(password: &Password, strength: AesStrength) -> Result<(Vec<u8>, AesCtr, HmacSha1)> {
        let mut salt = vec![0u8; strength.salt_len()];
        random_bytes(&mut salt)?;
        let keys = derive_keys(password, &salt, strength);
        let ctr = AesCtr::new(strength, &keys.encryption)?;
        let mac = new_mac(&keys.authentication)?;
        salt.extend_from_slice(&keys.verifier);
        Ok((salt, ctr, mac))
    }

    /// Appends the authentication code and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let tag = self.mac.finalize().into_bytes();
        self.inner.write_all(&tag[..AUTH_CODE_LEN])?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for AesWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.ctr.apply(&mut self.scratch);
        self.mac.update(&self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypting reader.
///
/// The password verifier is checked on construction. The authentication
/// code is checked by the read that consumes the last ciphertext byte, so
/// only the final chunk is held back until it matches. Earlier chunks are
/// unauthenticated when they are returned.
pub struct AesReader<R> {
    inner: R,
    ctr: AesCtr,
    mac: Option<HmacSha1>,
    remaining: u64,
    entry_name: String,
}

impl<R> std::fmt::Debug for AesReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesReader")
            .field("entry_name", &self.entry_name)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl<R: Read> AesReader<R> {
    /// Reads the salt and verifier from `inner`.
    ///
    /// `data_len` is the full encrypted length including salt, verifier and
    /// authentication code.
    pub fn new(
        mut inner: R,
        password: &Password,
        strength: AesStrength,
        data_len: u64,
        entry_name: &str,
    ) -> Result<Self> {
        let overhead = (strength.salt_len() + VERIFIER_LEN + AUTH_CODE_LEN) as u64;
        let remaining = data_len.checked_sub(overhead).ok_or_else(|| {
            Error::corrupt_header(
                0,
                format!("AES entry '{}' shorter than its overhead", entry_name),
            )
        })?;

        let mut salt = vec![0u8; strength.salt_len()];
        let mut verifier = [0u8; VERIFIER_LEN];
        inner.read_exact(&mut salt)?;
        inner.read_exact(&mut verifier)?;

        let keys = derive_keys(password, &salt, strength);
        if keys.verifier != verifier {
            return Err(Error::wrong_password(
                entry_name,
                PasswordDetectionMethod::VerificationBytes,
            ));
        }
        Ok(Self {
            inner,
            ctr: AesCtr::new(strength, &keys.encryption)?,
            mac: Some(new_mac(&keys.authentication)?),
            remaining,
            entry_name: entry_name.to_string(),
        })
    }

    fn verify(&mut self) -> io::Result<()> {
        let Some(mac) = self.mac.take() else {
            return Ok(());
        };
        let mut tag = [0u8; AUTH_CODE_LEN];
        self.inner.read_exact(&mut tag)?;
        mac.verify_truncated_left(&tag).map_err(|_| {
            io::Error::other(Error::wrong_password(
                &self.entry_name,
                PasswordDetectionMethod::AuthenticationCode,
            ))
        })
    }
}

impl<R: Read> Read for AesReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            self.verify()?;
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "AES ciphertext truncated",
            ));
        }
        if let Some(mac) = self.mac.as_mut() {
            mac.update(&buf[..n]);
        }
        self.remaining -= n as u64;
        if self.remaining == 0 {
            self.verify()?;
        }
        self.ctr.apply(&mut buf[..n]);
        Ok(n)
    }
}
