//! Writer construction and finalization.

use std::io::{Seek, Write};
use std::path::Path;

use crate::format::MAX_COMMENT_LEN;
use crate::volume::{FileVolume, SeekableVolume, SplitConfig, StreamingVolume, VolumeWriter};
use crate::{Error, Result};

use super::options::{WriteOptions, WriteResult};
use super::Writer;

impl Writer<FileVolume> {
    /// Creates a new archive file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_options(path, WriteOptions::default())
    }

    /// Creates a new archive file, split if `options.split` is set.
    pub fn create_with_options(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let sink = FileVolume::create(path, options.split)?;
        Ok(Self::from_sink(sink).options(options))
    }

    /// Creates a split archive.
    ///
    /// With [`SplitNaming::Pkware`](crate::volume::SplitNaming::Pkware) the
    /// parts are `path` with `.z01`, `.z02`, ... extensions and the last part
    /// is `path` itself. With
    /// [`SplitNaming::Numbered`](crate::volume::SplitNaming::Numbered) they
    /// are `path.001`, `path.002`, ...
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use zipkit::volume::SplitConfig;
    /// use zipkit::{EntryOptions, Writer};
    ///
    /// let mut writer = Writer::create_split("backup.zip", SplitConfig::new(50 * 1024 * 1024)?)?;
    /// writer.add_bytes("data.bin", &large_data, &EntryOptions::default())?;
    /// let result = writer.finish()?;
    /// println!("Created {} volumes", result.volume_count);
    /// ```
    pub fn create_split(path: impl AsRef<Path>, config: SplitConfig) -> Result<Self> {
        Self::create_with_options(path, WriteOptions::new().split(config))
    }
}

impl<W: Write + Seek> Writer<SeekableVolume<W>> {
    /// Creates a writer over a seekable sink. The archive starts at the
    /// sink's current position.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink's position cannot be queried.
    pub fn new(sink: W) -> Result<Self> {
        Ok(Self::from_sink(SeekableVolume::new(sink)?))
    }
}

impl<W: Write> Writer<StreamingVolume<W>> {
    /// Creates a writer over a sink that cannot seek. Streamed entries are
    /// followed by Data Descriptors.
    pub fn new_streaming(sink: W) -> Self {
        Self::from_sink(StreamingVolume::new(sink))
    }
}

impl<V: VolumeWriter> Writer<V> {
    /// Finishes the archive.
    ///
    /// An entry still open is closed first; an abandoned one is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if closing the open entry or writing the central
    /// directory fails.
    pub fn finish(self) -> Result<WriteResult> {
        let (result, _output) = self.finish_into_inner()?;
        Ok(result)
    }

    /// Finishes the archive and returns what the sink hands back: the inner
    /// writer for in-memory and streaming sinks, or the
    /// [`DiskTable`](crate::volume::DiskTable) of files written for
    /// [`FileVolume`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::io::Cursor;
    /// use zipkit::{EntryOptions, Writer};
    ///
    /// let mut writer = Writer::new(Cursor::new(Vec::new()))?;
    /// writer.add_bytes("test.txt", b"Hello", &EntryOptions::default())?;
    /// let (result, cursor) = writer.finish_into_inner()?;
    /// let archive_bytes = cursor.into_inner();
    /// assert_eq!(result.archive_size, archive_bytes.len() as u64);
    /// # Ok::<(), zipkit::Error>(())
    /// ```
    pub fn finish_into_inner(mut self) -> Result<(WriteResult, V::Output)> {
        if self.is_entry_open() {
            self.close_entry()?;
        }
        let mut sink = self.take_sink()?;
        if sink.position() != self.expected_end {
            return Err(Error::invariant(format!(
                "sink is at {} but the last entry ended at {}",
                sink.position(),
                self.expected_end
            )));
        }

        if let Some(comment) = self.options.comment.take() {
            let mut bytes = comment.into_bytes();
            if bytes.len() > MAX_COMMENT_LEN {
                log::warn!(
                    "archive comment is {} bytes; truncating to {}",
                    bytes.len(),
                    MAX_COMMENT_LEN
                );
                bytes.truncate(MAX_COMMENT_LEN);
            }
            self.model.comment = bytes;
        }

        let summary =
            super::assemble::write_central_directory(&mut sink, &mut self.model, self.options.zip64)?;
        let archive_size = sink.position();
        let volume_count = sink.volume_count();
        let output = sink.finish_volume()?;

        let model = &self.model;
        let files = model.iter().filter(|e| !e.is_directory);
        let result = WriteResult {
            entries_written: files.clone().count(),
            directories_written: model.iter().filter(|e| e.is_directory).count(),
            total_size: files.clone().map(|e| e.uncompressed_size).sum(),
            compressed_size: files.map(|e| e.compressed_size).sum(),
            archive_size,
            zip64: summary.zip64,
            volume_count,
        };
        Ok((result, output))
    }
}
