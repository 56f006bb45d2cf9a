//! Adding entries: streamed, from memory, and directories.

use std::io::Write;
use std::mem;

use super::header::{EntryPlan, HeaderPosition, Measured, SizeDelivery};
use super::options::EntryOptions;
use super::{OpenEntry, State, Writer};
use crate::codec::CompressionMethod;
use crate::crypto::EncryptionMethod;
use crate::format::local::DataDescriptor;
use crate::model::Entry;
use crate::pipeline::{EntryEncoder, SetupError};
use crate::volume::VolumeWriter;
use crate::{Error, Result, map_io_error};

/// Writes the local header at the sink's position and reports where it
/// landed. The header is never split across disks.
fn write_local_header<V: VolumeWriter>(sink: &mut V, header: &[u8]) -> Result<HeaderPosition> {
    sink.ensure_room(header.len() as u64)?;
    let position = HeaderPosition {
        absolute: sink.position(),
        disk: sink.current_disk(),
        disk_offset: sink.disk_offset(),
    };
    sink.write_all(header)?;
    Ok(position)
}

fn write_record<V: VolumeWriter>(sink: &mut V, header: &[u8], data: &[u8]) -> Result<HeaderPosition> {
    let position = write_local_header(sink, header)?;
    sink.write_all(data)?;
    Ok(position)
}

impl<V: VolumeWriter> Writer<V> {
    fn check_name_free(&self, name: &str) -> Result<()> {
        if self.model.contains(name) {
            return Err(Error::EntryExists {
                name: name.to_string(),
            });
        }
        if let State::Writing(open) = &self.state {
            return Err(Error::EntryInProgress {
                name: open.plan.name.clone(),
            });
        }
        Ok(())
    }

    /// Discards an abandoned entry, leaving the writer idle.
    fn settle(&mut self) -> Result<()> {
        let sink = self.take_sink()?;
        self.state = State::Idle(sink);
        Ok(())
    }

    /// Starts a streamed entry. Its data is written through this writer's
    /// [`Write`] implementation and ends with [`close_entry`](Self::close_entry).
    ///
    /// Options are validated before anything is written.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryInProgress`] if another entry is still open.
    /// - [`Error::EntryExists`] if the name is taken.
    /// - [`Error::UnsupportedMethod`], [`Error::InvalidCompressionLevel`] or
    ///   [`Error::PasswordRequired`] for unusable options.
    pub fn start_entry(&mut self, name: impl Into<String>, options: &EntryOptions) -> Result<()> {
        let name = name.into();
        self.check_name_free(&name)?;
        let plan = EntryPlan::new(name, options, false, options.reserves_zip64())?;
        self.settle()?;
        let can_patch = matches!(&self.state, State::Idle(sink) if sink.can_patch());
        let plan = plan.with_delivery(
            if can_patch && options.encryption != EncryptionMethod::ZipCrypto {
                SizeDelivery::Patched
            } else {
                SizeDelivery::Descriptor
            },
        );
        let header = plan.local_header(None).encode()?;
        let encryption = plan.encryption_params(0)?;

        let mut sink = self.take_sink()?;
        let position = match write_local_header(&mut sink, &header) {
            Ok(position) => position,
            Err(e) => {
                self.expected_end = sink.position();
                self.state = State::Idle(sink);
                return Err(e);
            }
        };
        let data_start = sink.position();
        let encoder = match EntryEncoder::new(sink, plan.compression, plan.level, encryption) {
            Ok(encoder) => encoder,
            Err(SetupError {
                error,
                inner: Some(sink),
            }) => {
                self.expected_end = sink.position();
                self.state = State::Idle(sink);
                return Err(error);
            }
            Err(failed) => return Err(failed.error),
        };
        log::debug!(
            "started entry '{}' at offset {} ({:?})",
            plan.name,
            position.absolute,
            plan.delivery
        );
        self.state = State::Writing(OpenEntry {
            plan,
            encoder,
            position,
            header_len: header.len() as u64,
            data_start,
        });
        Ok(())
    }

    /// Closes the streamed entry: flushes the pipeline, then records CRC and
    /// sizes by patching the local header or appending a Data Descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoEntryInProgress`] if no entry is open, including
    /// when the open entry was abandoned by a failed write.
    pub fn close_entry(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, State::Poisoned) {
            State::Writing(open) => self.complete(open),
            State::Abandoned(open) => {
                let sink = self.discard(open)?;
                self.state = State::Idle(sink);
                Err(Error::NoEntryInProgress)
            }
            State::Idle(sink) => {
                self.state = State::Idle(sink);
                Err(Error::NoEntryInProgress)
            }
            State::Poisoned => Err(super::poisoned()),
        }
    }

    fn complete(&mut self, open: OpenEntry<V>) -> Result<()> {
        let OpenEntry {
            plan,
            encoder,
            position,
            header_len,
            data_start,
        } = open;
        let encoded = encoder.finish().map_err(map_io_error)?;
        let mut sink = encoded.inner;
        let measured = Measured {
            crc32: encoded.crc32,
            compressed_size: sink.position() - data_start,
            uncompressed_size: encoded.uncompressed_size,
        };

        if let Err(e) = plan.check_fits(&measured) {
            log::warn!("dropping entry '{}': {}", plan.name, e);
            self.expected_end = sink.position();
            self.state = State::Idle(sink);
            return Err(e);
        }

        match plan.delivery {
            SizeDelivery::Patched => {
                let header = plan.local_header(Some(&measured)).encode()?;
                if header.len() as u64 != header_len {
                    return Err(Error::invariant(format!(
                        "patched local header of '{}' is {} bytes, placeholder was {}",
                        plan.name,
                        header.len(),
                        header_len
                    )));
                }
                sink.patch(position.absolute, &header)?;
            }
            SizeDelivery::Descriptor => {
                let descriptor = plan.descriptor(&measured);
                sink.ensure_room(DataDescriptor::encoded_len(descriptor.zip64))?;
                descriptor.write(&mut sink)?;
            }
            SizeDelivery::Known => {}
        }

        log::debug!(
            "closed entry '{}': {} -> {} bytes, crc {:08x}",
            plan.name,
            measured.uncompressed_size,
            measured.compressed_size,
            measured.crc32
        );
        self.expected_end = sink.position();
        self.state = State::Idle(sink);
        let entry = plan.into_entry(&measured, position)?;
        self.model.push(entry)
    }

    /// Adds an entry whose data is already in memory.
    ///
    /// The data is encoded before the local header is written, so the
    /// header carries the real CRC and sizes and no Data Descriptor is
    /// needed, even on a streaming sink.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::io::Cursor;
    /// use zipkit::{CompressionMethod, EntryOptions, Writer};
    ///
    /// let mut writer = Writer::new(Cursor::new(Vec::new()))?;
    /// let opts = EntryOptions::new().compression(CompressionMethod::Store);
    /// writer.add_bytes("readme.txt", b"0123456789", &opts)?;
    /// let result = writer.finish()?;
    /// assert_eq!(result.entries_written, 1);
    /// # Ok::<(), zipkit::Error>(())
    /// ```
    pub fn add_bytes(&mut self, name: impl Into<String>, data: &[u8], options: &EntryOptions) -> Result<()> {
        let name = name.into();
        self.check_name_free(&name)?;
        let reserve = options.reserves_zip64();
        let plan = EntryPlan::new(name, options, false, reserve)?;
        self.write_known(plan, data)
    }

    /// Adds a directory entry. A trailing `/` is appended if missing.
    pub fn add_directory(&mut self, name: impl Into<String>, options: &EntryOptions) -> Result<()> {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        self.check_name_free(&name)?;
        let mut dir_options = options.clone();
        dir_options.compression = CompressionMethod::Store;
        dir_options.encryption = EncryptionMethod::None;
        dir_options.password = None;
        let plan = EntryPlan::new(name, &dir_options, true, false)?;
        self.write_known(plan, &[])
    }

    fn write_known(&mut self, plan: EntryPlan, data: &[u8]) -> Result<()> {
        let crc32 = crate::checksum::Crc32::compute(data);
        let mut encoder = EntryEncoder::new(
            Vec::new(),
            plan.compression,
            plan.level,
            plan.encryption_params(crc32)?,
        )?;
        encoder.write_all(data)?;
        let encoded = encoder.finish()?;
        let measured = Measured {
            crc32,
            compressed_size: encoded.inner.len() as u64,
            uncompressed_size: data.len() as u64,
        };
        let header = plan.local_header(Some(&measured)).encode()?;

        let mut sink = self.take_sink()?;
        let written = write_record(&mut sink, &header, &encoded.inner);
        self.expected_end = sink.position();
        self.state = State::Idle(sink);
        let position = written?;

        log::debug!(
            "added entry '{}' at offset {}: {} -> {} bytes",
            plan.name,
            position.absolute,
            measured.uncompressed_size,
            measured.compressed_size
        );
        let entry: Entry = plan.into_entry(&measured, position)?;
        self.model.push(entry)
    }
}
