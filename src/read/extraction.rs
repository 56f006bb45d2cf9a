//! Entry extraction.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::crypto::Password;
use crate::format::local::LocalFileHeader;
use crate::pipeline::EntryDecoder;
use crate::{Error, Result, map_io_error};

use super::{Archive, resolve_in};

/// Plaintext staged in memory before [`Archive::extract_to`] spills to a
/// temporary file.
const STAGING_MEMORY_LIMIT: usize = 8 << 20;

/// Streaming reader over one entry's plaintext, borrowed from its
/// [`Archive`].
///
/// Reading to the end verifies the entry's CRC (and the AES
/// authentication code); failures arrive as `io::Error`s that
/// [`map_io_error`] turns back into crate errors.
pub type EntryReader<'a, R> = EntryDecoder<&'a mut R>;

impl<R: Read + Seek> Archive<R> {
    /// Sets the password used for encrypted entries.
    pub fn set_password(&mut self, password: Password) {
        self.password = Some(password);
    }

    /// Opens an entry for streaming, using the archive password if one
    /// was set.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if no entry has this name.
    /// - [`Error::PasswordRequired`] for an encrypted entry with no
    ///   password.
    /// - [`Error::WrongPassword`] if the password verifier rejects the
    ///   password. This happens before any plaintext is produced.
    /// - [`Error::UnsupportedMethod`] if the entry's method is not built in.
    ///
    /// Bytes of an encrypted entry are unauthenticated until the reader
    /// reaches the end: the CRC and the AES authentication code are only
    /// checked there. Use [`extract_to`](Self::extract_to) or
    /// [`extract_to_vec`](Self::extract_to_vec) to receive nothing unless
    /// the whole entry checks out.
    pub fn by_name(&mut self, name: &str) -> Result<EntryReader<'_, R>> {
        let password = self.password.clone();
        self.open_entry(name, password.as_ref())
    }

    /// Opens an entry for streaming with an explicit password.
    pub fn by_name_with_password(
        &mut self,
        name: &str,
        password: &Password,
    ) -> Result<EntryReader<'_, R>> {
        self.open_entry(name, Some(password))
    }

    /// Extracts an entry into memory.
    ///
    /// # Errors
    ///
    /// As [`by_name`](Self::by_name), plus [`Error::CrcMismatch`] for
    /// corrupt data.
    pub fn extract_to_vec(&mut self, name: &str) -> Result<Vec<u8>> {
        // Cap the pre-allocation; the size comes from the archive.
        let capacity = self.model.get(name).map_or(0, |e| e.uncompressed_size.min(1 << 24));
        let mut reader = self.by_name(name)?;
        let mut out = Vec::with_capacity(capacity as usize);
        reader.read_to_end(&mut out).map_err(map_io_error)?;
        Ok(out)
    }

    /// Streams an entry into `writer`, returning the number of bytes
    /// written.
    ///
    /// Encrypted entries are decoded into a staging buffer first, spilling
    /// to a temporary file past 8 MiB, and only copied to `writer` once the
    /// CRC and authentication code have been verified. On a wrong password
    /// or tampered data `writer` receives nothing.
    pub fn extract_to<W: Write>(&mut self, name: &str, writer: &mut W) -> Result<u64> {
        let encrypted = self
            .model
            .get(name)
            .is_some_and(|e| e.encryption.is_encrypted());
        let mut reader = self.by_name(name)?;
        if !encrypted {
            return io::copy(&mut reader, writer).map_err(map_io_error);
        }
        let mut staged = tempfile::spooled_tempfile(STAGING_MEMORY_LIMIT);
        io::copy(&mut reader, &mut staged).map_err(map_io_error)?;
        staged.seek(SeekFrom::Start(0))?;
        Ok(io::copy(&mut staged, writer)?)
    }

    fn open_entry(&mut self, name: &str, password: Option<&Password>) -> Result<EntryReader<'_, R>> {
        let entry = self.model.get(name).ok_or_else(|| Error::EntryNotFound {
            name: name.to_string(),
        })?;
        let header_offset = resolve_in(
            self.naming,
            &self.table,
            entry.disk_number,
            entry.local_header_offset,
        )?;
        let span = LocalFileHeader::read_span(&mut self.reader, header_offset)?;
        log::trace!(
            "entry '{}': local header at {}, data at {}",
            entry.name,
            header_offset,
            span.data_offset()
        );
        self.reader.seek(SeekFrom::Start(span.data_offset()))?;
        EntryDecoder::new(&mut self.reader, &entry.decode_params()?, password)
    }
}
