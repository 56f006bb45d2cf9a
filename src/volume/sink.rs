//! Single-file sinks.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::config::SplitConfig;
use super::disk::DiskTable;
use super::writer::{SplitWriter, VolumeWriter};
use crate::Result;

/// A seekable single-file sink.
///
/// Supports in-place patching, so entries written here never need a Data
/// Descriptor.
#[derive(Debug)]
pub struct SeekableVolume<W> {
    inner: W,
    position: u64,
}

impl<W: Write + Seek> SeekableVolume<W> {
    /// Wraps `inner`, continuing from its current stream position.
    pub fn new(mut inner: W) -> io::Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self { inner, position })
    }

    /// Returns a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write + Seek> Write for SeekableVolume<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek> VolumeWriter for SeekableVolume<W> {
    type Output = W;

    fn position(&self) -> u64 {
        self.position
    }

    fn can_patch(&self) -> bool {
        true
    }

    fn patch(&mut self, position: u64, bytes: &[u8]) -> io::Result<()> {
        if position + bytes.len() as u64 > self.position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "patch extends past the written data",
            ));
        }
        self.inner.seek(SeekFrom::Start(position))?;
        self.inner.write_all(bytes)?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    fn finish_volume(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// A forward-only sink. Every streamed entry gets a Data Descriptor.
#[derive(Debug)]
pub struct StreamingVolume<W> {
    inner: W,
    position: u64,
}

impl<W: Write> StreamingVolume<W> {
    /// Wraps `inner`, counting from zero.
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }
}

impl<W: Write> Write for StreamingVolume<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> VolumeWriter for StreamingVolume<W> {
    type Output = W;

    fn position(&self) -> u64 {
        self.position
    }

    fn finish_volume(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// A sink backed by files on disk: one seekable file, or a split set.
#[derive(Debug)]
pub enum FileVolume {
    /// One archive file.
    Single {
        /// The file.
        sink: SeekableVolume<BufWriter<File>>,
        /// Its path.
        path: PathBuf,
    },
    /// A split archive.
    Split(SplitWriter),
}

impl FileVolume {
    /// Creates the archive at `path`, split if `split` is given.
    pub fn create(path: impl AsRef<Path>, split: Option<SplitConfig>) -> Result<Self> {
        let path = path.as_ref();
        match split {
            Some(config) => Ok(FileVolume::Split(SplitWriter::create(path, config)?)),
            None => {
                let file = File::create(path)?;
                Ok(FileVolume::Single {
                    sink: SeekableVolume::new(BufWriter::new(file))?,
                    path: path.to_path_buf(),
                })
            }
        }
    }

    /// Opens an existing single-file archive for writing at `offset`.
    ///
    /// Bytes past the final position are cut off when the sink is finished.
    pub fn open_at(path: impl AsRef<Path>, offset: u64) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(FileVolume::Single {
            sink: SeekableVolume::new(BufWriter::new(file))?,
            path: path.to_path_buf(),
        })
    }
}

impl Write for FileVolume {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileVolume::Single { sink, .. } => sink.write(buf),
            FileVolume::Split(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileVolume::Single { sink, .. } => sink.flush(),
            FileVolume::Split(w) => w.flush(),
        }
    }
}

impl VolumeWriter for FileVolume {
    type Output = DiskTable;

    fn position(&self) -> u64 {
        match self {
            FileVolume::Single { sink, .. } => sink.position(),
            FileVolume::Split(w) => w.position(),
        }
    }

    fn current_disk(&self) -> u32 {
        match self {
            FileVolume::Single { .. } => 0,
            FileVolume::Split(w) => w.current_disk(),
        }
    }

    fn disk_offset(&self) -> u64 {
        match self {
            FileVolume::Single { sink, .. } => sink.disk_offset(),
            FileVolume::Split(w) => w.disk_offset(),
        }
    }

    fn ensure_room(&mut self, len: u64) -> io::Result<()> {
        match self {
            FileVolume::Single { .. } => Ok(()),
            FileVolume::Split(w) => w.ensure_room(len),
        }
    }

    fn can_patch(&self) -> bool {
        matches!(self, FileVolume::Single { .. })
    }

    fn patch(&mut self, position: u64, bytes: &[u8]) -> io::Result<()> {
        match self {
            FileVolume::Single { sink, .. } => sink.patch(position, bytes),
            FileVolume::Split(w) => w.patch(position, bytes),
        }
    }

    fn volume_count(&self) -> u32 {
        match self {
            FileVolume::Single { .. } => 1,
            FileVolume::Split(w) => w.volume_count(),
        }
    }

    fn finish_volume(self) -> io::Result<DiskTable> {
        match self {
            FileVolume::Single { sink, path } => {
                let length = sink.position();
                let file = sink.finish_volume()?.into_inner().map_err(|e| e.into_error())?;
                file.set_len(length)?;
                Ok(DiskTable::from_parts([(path, length)]))
            }
            FileVolume::Split(w) => w.finish_volume(),
        }
    }
}
