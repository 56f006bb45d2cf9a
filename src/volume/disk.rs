//! The disk table: physical parts of an archive and their placement in the
//! logical address space.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// One physical volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    /// Ordinal, starting at 0.
    pub number: u32,
    /// File path.
    pub path: PathBuf,
    /// Absolute offset of the disk's first byte.
    pub absolute_offset: u64,
    /// Length in bytes.
    pub length: u64,
    /// True for the final disk, which holds the trailer.
    pub last: bool,
}

/// Ordered list of disks with cumulative offsets.
///
/// `disks[i].absolute_offset` is the sum of all preceding lengths, so the
/// table maps every absolute offset to exactly one `(disk, relative)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskTable {
    disks: Vec<Disk>,
}

impl DiskTable {
    /// Builds the table from paths and lengths in disk order.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = (P, u64)>,
        P: Into<PathBuf>,
    {
        let mut disks: Vec<Disk> = Vec::new();
        let mut offset = 0u64;
        for (number, (path, length)) in parts.into_iter().enumerate() {
            disks.push(Disk {
                number: number as u32,
                path: path.into(),
                absolute_offset: offset,
                length,
                last: false,
            });
            offset += length;
        }
        if let Some(last) = disks.last_mut() {
            last.last = true;
        }
        Self { disks }
    }

    /// Builds the table by reading each file's length.
    pub fn from_paths<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut parts = Vec::new();
        for (index, path) in paths.into_iter().enumerate() {
            let path = path.as_ref();
            let length = std::fs::metadata(path)
                .map_err(|e| Error::VolumeMissing {
                    volume: index as u32 + 1,
                    path: path.display().to_string(),
                    source: e,
                })?
                .len();
            parts.push((path.to_path_buf(), length));
        }
        Ok(Self::from_parts(parts))
    }

    /// All disks in order.
    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    /// Number of disks.
    pub fn len(&self) -> usize {
        self.disks.len()
    }

    /// Returns true if the table has no disks.
    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// Disk by number.
    pub fn disk(&self, number: u32) -> Option<&Disk> {
        self.disks.get(number as usize)
    }

    /// Sum of all disk lengths.
    pub fn total_length(&self) -> u64 {
        self.disks
            .last()
            .map_or(0, |d| d.absolute_offset + d.length)
    }

    /// Paths of all disks.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.disks.iter().map(|d| d.path.clone()).collect()
    }

    /// Maps an absolute offset to `(disk, offset within disk)`.
    ///
    /// The end of the archive maps to the end of the last disk. Offsets past
    /// the end return `None`. Empty disks are skipped.
    pub fn locate(&self, absolute: u64) -> Option<(u32, u64)> {
        if absolute > self.total_length() {
            return None;
        }
        let index = self
            .disks
            .partition_point(|d| d.absolute_offset + d.length <= absolute);
        match self.disks.get(index) {
            Some(disk) => Some((disk.number, absolute - disk.absolute_offset)),
            None => self.disks.last().map(|d| (d.number, d.length)),
        }
    }

    /// Maps `(disk, offset within disk)` to an absolute offset.
    pub fn absolute(&self, disk: u32, relative: u64) -> Result<u64> {
        let entry = self.disk(disk).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "disk {} referenced but the archive has {} disks",
                disk,
                self.disks.len()
            ))
        })?;
        if relative > entry.length {
            return Err(Error::InvalidFormat(format!(
                "offset {} is past the end of disk {} ({} bytes)",
                relative, disk, entry.length
            )));
        }
        Ok(entry.absolute_offset + relative)
    }
}
