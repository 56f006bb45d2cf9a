//! Output side of the disk abstraction.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::config::{SplitConfig, SplitNaming, numbered_part_path, part_path, pkware_part_path};
use super::disk::DiskTable;
use crate::format::{SINGLE_SEGMENT_MARKER, SPLIT_ARCHIVE_MARKER};
use crate::Result;

/// A destination for archive bytes that knows where it is.
///
/// The archive writer owns exactly one of these and asks it for positions
/// instead of counting bytes itself. `current_disk` and `disk_offset`
/// return the values headers must record, which for a spanned archive are
/// per-disk and for everything else are disk 0 and the absolute position.
pub trait VolumeWriter: Write {
    /// What [`finish_volume`](VolumeWriter::finish_volume) hands back.
    type Output;

    /// Absolute logical position: total bytes written so far.
    fn position(&self) -> u64;

    /// Disk number to record for data written next.
    fn current_disk(&self) -> u32 {
        0
    }

    /// Offset to record for data written next.
    fn disk_offset(&self) -> u64 {
        self.position()
    }

    /// Moves to a fresh disk if `len` bytes would not fit on the current one.
    ///
    /// Called before every header so no record straddles two disks.
    fn ensure_room(&mut self, _len: u64) -> io::Result<()> {
        Ok(())
    }

    /// True if already written bytes can be overwritten.
    fn can_patch(&self) -> bool {
        false
    }

    /// Overwrites bytes at absolute `position`, then returns to the end.
    fn patch(&mut self, _position: u64, _bytes: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "this sink cannot rewrite written bytes",
        ))
    }

    /// Number of physical files written so far.
    fn volume_count(&self) -> u32 {
        1
    }

    /// Flushes and closes the sink.
    fn finish_volume(self) -> io::Result<Self::Output>
    where
        Self: Sized;
}

/// Writes a split archive, rolling over to a new part when the configured
/// size is reached.
///
/// With [`SplitNaming::Pkware`] the part being written is always the
/// archive path itself; on rollover it is renamed to `.zNN`, so after
/// [`finish_volume`](VolumeWriter::finish_volume) the final part is the
/// `.zip`. The first part starts with the split marker, which becomes
/// `PK00` if the archive never rolled over.
///
/// # Example
///
/// ```rust,ignore
/// use zipkit::volume::{SplitConfig, SplitWriter};
///
/// let config = SplitConfig::new(1024 * 1024)?;
/// let mut writer = SplitWriter::create("backup.zip", config)?;
/// ```
pub struct SplitWriter {
    archive: PathBuf,
    config: SplitConfig,
    file: Option<BufWriter<File>>,
    current_disk: u32,
    disk_written: u64,
    total_written: u64,
    completed: Vec<u64>,
}

impl SplitWriter {
    /// Creates the first part.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(archive: impl AsRef<Path>, config: SplitConfig) -> Result<Self> {
        let archive = archive.as_ref().to_path_buf();
        let mut writer = Self {
            file: None,
            archive,
            config,
            current_disk: 0,
            disk_written: 0,
            total_written: 0,
            completed: Vec::new(),
        };
        writer.open_part()?;
        if config.split_naming() == SplitNaming::Pkware {
            writer.write_all(&SPLIT_ARCHIVE_MARKER.to_le_bytes())?;
        }
        Ok(writer)
    }

    fn working_path(&self) -> PathBuf {
        match self.config.split_naming() {
            SplitNaming::Pkware => self.archive.clone(),
            SplitNaming::Numbered => numbered_part_path(&self.archive, self.current_disk),
        }
    }

    fn open_part(&mut self) -> io::Result<()> {
        let path = self.working_path();
        let file = File::create(&path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to create volume {}: {}", path.display(), e),
            )
        })?;
        self.file = Some(BufWriter::new(file));
        self.disk_written = 0;
        Ok(())
    }

    fn close_part(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn roll_over(&mut self) -> io::Result<()> {
        self.close_part()?;
        if self.config.split_naming() == SplitNaming::Pkware {
            let target = pkware_part_path(&self.archive, self.current_disk);
            std::fs::rename(&self.archive, &target)?;
        }
        self.completed.push(self.disk_written);
        self.current_disk += 1;
        log::debug!(
            "split archive {} rolled over to disk {}",
            self.archive.display(),
            self.current_disk
        );
        self.open_part()
    }

    /// Path of the archive (the final PKWARE part, or the numbered base).
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// Bytes still available on the current part.
    pub fn remaining_in_volume(&self) -> u64 {
        self.config.size().saturating_sub(self.disk_written)
    }

    /// Number of the part currently being written, starting at 0.
    pub fn volume_index(&self) -> u32 {
        self.current_disk
    }
}

impl Write for SplitWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining_in_volume() == 0 {
            self.roll_over()?;
        }
        let to_write = buf
            .len()
            .min(usize::try_from(self.remaining_in_volume()).unwrap_or(usize::MAX));
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("Current volume file not open"))?;
        let n = file.write(&buf[..to_write])?;
        self.disk_written += n as u64;
        self.total_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl VolumeWriter for SplitWriter {
    type Output = DiskTable;

    fn position(&self) -> u64 {
        self.total_written
    }

    fn current_disk(&self) -> u32 {
        match self.config.split_naming() {
            SplitNaming::Pkware => self.current_disk,
            SplitNaming::Numbered => 0,
        }
    }

    fn disk_offset(&self) -> u64 {
        match self.config.split_naming() {
            SplitNaming::Pkware => self.disk_written,
            SplitNaming::Numbered => self.total_written,
        }
    }

    fn volume_count(&self) -> u32 {
        self.current_disk + 1
    }

    fn ensure_room(&mut self, len: u64) -> io::Result<()> {
        if self.config.split_naming() == SplitNaming::Numbered {
            return Ok(());
        }
        if len <= self.config.size() && len > self.remaining_in_volume() {
            self.roll_over()?;
        }
        Ok(())
    }

    fn finish_volume(mut self) -> io::Result<DiskTable> {
        self.close_part()?;
        self.completed.push(self.disk_written);
        let count = self.completed.len();
        let naming = self.config.split_naming();
        if naming == SplitNaming::Pkware && count == 1 {
            let mut file = OpenOptions::new().write(true).open(&self.archive)?;
            file.write_all(&SINGLE_SEGMENT_MARKER.to_le_bytes())?;
            file.flush()?;
        }
        let parts = self.completed.iter().enumerate().map(|(i, &len)| {
            (part_path(&self.archive, naming, i as u32, i + 1 == count), len)
        });
        Ok(DiskTable::from_parts(parts))
    }
}

impl std::fmt::Debug for SplitWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitWriter")
            .field("archive", &self.archive)
            .field("config", &self.config)
            .field("current_disk", &self.current_disk)
            .field("disk_written", &self.disk_written)
            .field("total_written", &self.total_written)
            .finish()
    }
}
