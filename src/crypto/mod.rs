//! Entry encryption.
//!
//! Two schemes are supported:
//!
//! - **PKWARE traditional** ("ZipCrypto"): a byte-oriented stream cipher
//!   keyed from the password, with a 12-byte encrypted header whose last
//!   byte lets readers reject most wrong passwords. Weak; kept for
//!   compatibility.
//! - **WinZip AES** (AE-1/AE-2): AES in CTR mode with keys derived by
//!   PBKDF2-HMAC-SHA1, a salt and 2-byte password verifier ahead of the
//!   ciphertext, and a 10-byte HMAC-SHA1 authentication code after it.
//!   Requires the `aes` feature.
//!
//! Each scheme has a fixed overhead, which the entry pipeline adds to the
//! compressed size.

#[cfg(feature = "aes")]
#[cfg_attr(docsrs, doc(cfg(feature = "aes")))]
pub mod aes;
mod password;
pub mod zipcrypto;

pub use password::Password;

/// AES key strength, as stored in the AES extra field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AesStrength {
    /// 128-bit key, 8-byte salt.
    Aes128 = 1,
    /// 192-bit key, 12-byte salt.
    Aes192 = 2,
    /// 256-bit key, 16-byte salt.
    Aes256 = 3,
}

impl AesStrength {
    /// Parses the on-disk strength byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Aes128),
            2 => Some(Self::Aes192),
            3 => Some(Self::Aes256),
            _ => None,
        }
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Salt length in bytes.
    pub fn salt_len(self) -> usize {
        self.key_len() / 2
    }
}

/// WinZip AES vendor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AesVendorVersion {
    /// AE-1: the CRC-32 is stored and checked.
    Ae1 = 1,
    /// AE-2: the CRC-32 field is zero; only the MAC protects the data.
    Ae2 = 2,
}

impl AesVendorVersion {
    /// Parses the on-disk vendor version.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Ae1),
            2 => Some(Self::Ae2),
            _ => None,
        }
    }
}

/// Length of the WinZip AES password verifier.
pub const AES_VERIFIER_LEN: u64 = 2;

/// Length of the truncated HMAC-SHA1 authentication code.
pub const AES_AUTH_CODE_LEN: u64 = 10;

/// Raw compression method value marking a WinZip AES entry.
pub const AES_METHOD: u16 = 99;

/// How an entry's data is encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EncryptionMethod {
    /// Not encrypted.
    #[default]
    None,
    /// PKWARE traditional encryption.
    ZipCrypto,
    /// WinZip AES with the given key strength.
    Aes(AesStrength),
}

impl EncryptionMethod {
    /// Bytes written before the ciphertext.
    pub fn header_len(self) -> u64 {
        match self {
            Self::None => 0,
            Self::ZipCrypto => zipcrypto::HEADER_LEN as u64,
            Self::Aes(strength) => strength.salt_len() as u64 + AES_VERIFIER_LEN,
        }
    }

    /// Bytes written after the ciphertext.
    pub fn trailer_len(self) -> u64 {
        match self {
            Self::Aes(_) => AES_AUTH_CODE_LEN,
            _ => 0,
        }
    }

    /// Total fixed overhead added to the compressed size.
    pub fn overhead(self) -> u64 {
        self.header_len() + self.trailer_len()
    }

    /// Returns true for any real encryption.
    pub fn is_encrypted(self) -> bool {
        self != Self::None
    }

    /// Returns an error if this build cannot produce or read the method.
    pub fn ensure_supported(self) -> crate::Result<()> {
        match self {
            #[cfg(not(feature = "aes"))]
            Self::Aes(_) => Err(crate::Error::UnsupportedMethod { method: AES_METHOD }),
            _ => Ok(()),
        }
    }
}

/// Fills `buf` from the operating system's random source.
pub(crate) fn random_bytes(buf: &mut [u8]) -> crate::Result<()> {
    getrandom::getrandom(buf).map_err(|e| crate::Error::CryptoError(e.to_string()))
}
