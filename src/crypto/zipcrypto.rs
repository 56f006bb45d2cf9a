//! PKWARE traditional encryption.
//!
//! Three 32-bit keys are initialized from the password and advanced by
//! every plaintext byte. Each data byte is XORed with a keystream byte
//! derived from the third key. The ciphertext is preceded by a 12-byte
//! encrypted header: 11 random bytes and one check byte that readers compare
//! to detect a wrong password.

use std::io::{self, Read, Write};

use super::{Password, random_bytes};
use crate::error::PasswordDetectionMethod;
use crate::{Error, Result};

/// Length of the encryption header.
pub const HEADER_LEN: usize = 12;

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

// One step of the raw (non-inverted) CRC-32 register.
fn crc32_step(crc: u32, byte: u8) -> u32 {
    CRC_TABLE[((crc ^ byte as u32) & 0xff) as usize] ^ (crc >> 8)
}

#[derive(Clone)]
struct Keys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl Keys {
    fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            k0: 0x1234_5678,
            k1: 0x2345_6789,
            k2: 0x3456_7890,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.k0 = crc32_step(self.k0, plain);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xff)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.k2 = crc32_step(self.k2, (self.k1 >> 24) as u8);
    }

    fn keystream(&self) -> u8 {
        let temp = (self.k2 | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    fn encrypt(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.keystream();
        self.update(plain);
        cipher
    }

    fn decrypt(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.keystream();
        self.update(plain);
        plain
    }
}

/// The check byte for an entry.
///
/// When the CRC is known before the header is written it is the CRC's high
/// byte; entries using a Data Descriptor use the high byte of the DOS time
/// instead.
pub fn check_byte(crc32: u32, dos_time: u16, data_descriptor: bool) -> u8 {
    if data_descriptor {
        (dos_time >> 8) as u8
    } else {
        (crc32 >> 24) as u8
    }
}

/// Encrypting writer.
pub struct ZipCryptoWriter<W> {
    inner: W,
    keys: Keys,
    buffer: Vec<u8>,
}

impl<W> std::fmt::Debug for ZipCryptoWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipCryptoWriter").finish_non_exhaustive()
    }
}

impl<W: Write> ZipCryptoWriter<W> {
    /// Writes the encryption header and returns the writer.
    ///
    /// On failure `inner` is handed back with the error.
    pub fn new(mut inner: W, password: &Password, check: u8) -> std::result::Result<Self, (Error, W)> {
        let mut keys = Keys::new(password.as_bytes());
        let mut header = [0u8; HEADER_LEN];
        if let Err(e) = random_bytes(&mut header[..HEADER_LEN - 1]) {
            return Err((e, inner));
        }
        header[HEADER_LEN - 1] = check;
        for b in header.iter_mut() {
            *b = keys.encrypt(*b);
        }
        if let Err(e) = inner.write_all(&header) {
            return Err((e.into(), inner));
        }
        Ok(Self {
            inner,
            keys,
            buffer: Vec::new(),
        })
    }

    /// Flushes and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ZipCryptoWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.clear();
        self.buffer
            .extend(buf.iter().map(|&b| self.keys.encrypt(b)));
        self.inner.write_all(&self.buffer)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypting reader.
pub struct ZipCryptoReader<R> {
    inner: R,
    keys: Keys,
}

impl<R> std::fmt::Debug for ZipCryptoReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipCryptoReader").finish_non_exhaustive()
    }
}

impl<R: Read> ZipCryptoReader<R> {
    /// Reads and verifies the encryption header.
    ///
    /// Fails with [`Error::WrongPassword`] if the decrypted check byte does
    /// not match `check`.
    pub fn new(mut inner: R, password: &Password, check: u8, entry_name: &str) -> Result<Self> {
        let mut keys = Keys::new(password.as_bytes());
        let mut header = [0u8; HEADER_LEN];
        inner.read_exact(&mut header).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::corrupt_header(0, format!("encryption header of '{}' truncated", entry_name))
            } else {
                Error::Io(e)
            }
        })?;
        let mut last = 0;
        for &b in &header {
            last = keys.decrypt(b);
        }
        if last != check {
            return Err(Error::wrong_password(
                entry_name,
                PasswordDetectionMethod::VerificationBytes,
            ));
        }
        Ok(Self { inner, keys })
    }
}

impl<R: Read> Read for ZipCryptoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for b in &mut buf[..n] {
            *b = self.keys.decrypt(*b);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_table_matches_crc32fast() {
        // The raw register relates to the standard CRC by inversion.
        let mut raw = 0xFFFF_FFFFu32;
        for &b in b"123456789" {
            raw = crc32_step(raw, b);
        }
        assert_eq!(!raw, 0xCBF4_3926);
    }

    #[test]
    fn test_roundtrip() {
        let password = Password::new("hunter2");
        let mut out = Vec::new();
        let mut writer = ZipCryptoWriter::new(&mut out, &password, 0xAB).unwrap();
        writer.write_all(b"attack at dawn").unwrap();
        writer.finish().unwrap();
        assert_eq!(out.len(), HEADER_LEN + 14);
        assert_ne!(&out[HEADER_LEN..], b"attack at dawn");

        let mut reader = ZipCryptoReader::new(&out[..], &password, 0xAB, "x").unwrap();
        let mut plain = Vec::new();
        reader.read_to_end(&mut plain).unwrap();
        assert_eq!(plain, b"attack at dawn");
    }

    #[test]
    fn test_wrong_check_byte_rejected() {
        let password = Password::new("right");
        let mut out = Vec::new();
        ZipCryptoWriter::new(&mut out, &password, 0x42)
            .unwrap()
            .finish()
            .unwrap();
        let err = ZipCryptoReader::new(&out[..], &password, 0x43, "entry").unwrap_err();
        assert!(matches!(
            err,
            Error::WrongPassword {
                detection_method: PasswordDetectionMethod::VerificationBytes,
                ..
            }
        ));
    }

    #[test]
    fn test_check_byte_source() {
        assert_eq!(check_byte(0xAB00_0000, 0x1234, false), 0xAB);
        assert_eq!(check_byte(0xAB00_0000, 0x1234, true), 0x12);
    }
}
