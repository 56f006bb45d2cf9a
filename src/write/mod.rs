//! Archive writing API.
//!
//! A [`Writer`] owns one [`VolumeWriter`] sink and the [`ZipModel`] it is
//! filling. Entries are written one at a time: either in one call with
//! [`add_bytes`](Writer::add_bytes), or streamed with
//! [`start_entry`](Writer::start_entry), [`Write`] calls and
//! [`close_entry`](Writer::close_entry). [`finish`](Writer::finish) writes
//! the central directory and trailer.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Write;
//! use zipkit::{CompressionMethod, EntryOptions, Writer};
//!
//! let mut writer = Writer::create_path("archive.zip")?;
//!
//! writer.add_bytes("hello.txt", b"Hello, World!", &EntryOptions::default())?;
//!
//! writer.start_entry("log.txt", &EntryOptions::new().compression(CompressionMethod::Zstd))?;
//! writer.write_all(b"streamed line\n")?;
//! writer.close_entry()?;
//!
//! let result = writer.finish()?;
//! println!("Wrote {} entries", result.entries_written);
//! # Ok::<(), zipkit::Error>(())
//! ```
//!
//! # How sizes reach the archive
//!
//! When the data is handed over at once, CRC and sizes are known before the
//! local header is written. Streamed entries on a seekable single-file sink
//! get placeholder values that are patched in place on close. Streaming
//! sinks, split archives and streamed ZipCrypto entries (whose check byte
//! would need the CRC up front) set the data descriptor flag instead, and a
//! Data Descriptor follows the data.

mod append;
pub mod assemble;
mod entry;
mod header;
pub(crate) mod options;
mod writer_init;

use std::io::{self, Write};
use std::mem;

pub use assemble::{CentralDirectorySummary, write_central_directory};
pub use options::{EntryOptions, WriteOptions, WriteResult};

use crate::model::ZipModel;
use crate::pipeline::EntryEncoder;
use crate::volume::VolumeWriter;
use crate::Error;

use header::{EntryPlan, HeaderPosition};

/// An entry whose data is being streamed.
pub(crate) struct OpenEntry<V: VolumeWriter> {
    plan: EntryPlan,
    encoder: EntryEncoder<V>,
    position: HeaderPosition,
    header_len: u64,
    data_start: u64,
}

enum State<V: VolumeWriter> {
    /// Between entries; the sink is free.
    Idle(V),
    /// An entry is open and accepting data.
    Writing(OpenEntry<V>),
    /// A write into the open entry failed; it will be discarded.
    Abandoned(OpenEntry<V>),
    /// The sink was lost to an I/O failure.
    Poisoned,
}

/// A ZIP archive writer.
///
/// See the [module documentation](self) for an overview.
pub struct Writer<V: VolumeWriter> {
    state: State<V>,
    model: ZipModel,
    options: WriteOptions,
    /// Where the sink should be when no entry is open.
    expected_end: u64,
}

fn poisoned() -> Error {
    Error::Io(io::Error::other(
        "the archive writer lost its sink to an earlier failure",
    ))
}

impl<V: VolumeWriter> Writer<V> {
    /// Wraps an already positioned sink. Offsets are taken from the sink,
    /// so a sink that already holds bytes starts the archive after them.
    pub fn from_sink(sink: V) -> Self {
        let expected_end = sink.position();
        Self {
            state: State::Idle(sink),
            model: ZipModel::new(),
            options: WriteOptions::default(),
            expected_end,
        }
    }

    pub(crate) fn with_model(sink: V, model: ZipModel, expected_end: u64) -> Self {
        Self {
            state: State::Idle(sink),
            model,
            options: WriteOptions::default(),
            expected_end,
        }
    }

    /// Sets the archive-level options.
    pub fn options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// The entries closed so far.
    pub fn model(&self) -> &ZipModel {
        &self.model
    }

    /// Returns true while a streamed entry is open.
    pub fn is_entry_open(&self) -> bool {
        matches!(self.state, State::Writing(_))
    }

    /// Returns the sink if no entry is open, discarding an abandoned one.
    fn take_sink(&mut self) -> crate::Result<V> {
        match mem::replace(&mut self.state, State::Poisoned) {
            State::Idle(sink) => Ok(sink),
            State::Writing(open) => {
                let name = open.plan.name.clone();
                self.state = State::Writing(open);
                Err(Error::EntryInProgress { name })
            }
            State::Abandoned(open) => self.discard(open),
            State::Poisoned => Err(poisoned()),
        }
    }

    /// Finishes an abandoned entry's stages so the sink can be reused. The
    /// entry stays out of the central directory.
    fn discard(&mut self, open: OpenEntry<V>) -> crate::Result<V> {
        log::warn!(
            "discarding entry '{}' abandoned after a failed write",
            open.plan.name
        );
        let encoded = open.encoder.finish().map_err(crate::map_io_error)?;
        let sink = encoded.inner;
        self.expected_end = sink.position();
        Ok(sink)
    }

    fn abandon(&mut self) {
        if let State::Writing(open) = mem::replace(&mut self.state, State::Poisoned) {
            self.state = State::Abandoned(open);
        }
    }
}

impl<V: VolumeWriter> Write for Writer<V> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let State::Writing(open) = &mut self.state else {
            return Err(io::Error::other(Error::NoEntryInProgress));
        };
        match open.encoder.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.abandon();
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.state {
            State::Writing(open) => open.encoder.flush(),
            State::Idle(sink) => sink.flush(),
            _ => Ok(()),
        }
    }
}

impl<V: VolumeWriter> std::fmt::Debug for Writer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Idle(_) => "idle",
            State::Writing(_) => "writing",
            State::Abandoned(_) => "abandoned",
            State::Poisoned => "poisoned",
        };
        f.debug_struct("Writer")
            .field("state", &state)
            .field("entries", &self.model.len())
            .field("options", &self.options)
            .finish()
    }
}
