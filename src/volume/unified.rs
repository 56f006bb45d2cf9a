//! Unified reader over single-file and split archives.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::config::SplitNaming;
use super::disk::DiskTable;
use super::reader::SplitReader;
use crate::Result;

/// A reader that hides whether an archive is one file or many.
///
/// Both variants present the archive as a single absolute address space.
pub enum UnifiedReader {
    /// Ordinary single-file archive.
    Single {
        /// Buffered file handle.
        reader: BufReader<File>,
        /// Disk table with one entry.
        table: DiskTable,
    },
    /// Split archive.
    Split(SplitReader),
}

impl UnifiedReader {
    /// Opens `path`, detecting split sets from sibling files.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(reader) = SplitReader::open(path)? {
            log::debug!(
                "{} is a {:?} split archive with {} disks",
                path.display(),
                reader.naming(),
                reader.table().len()
            );
            return Ok(UnifiedReader::Split(reader));
        }
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(UnifiedReader::Single {
            reader: BufReader::new(file),
            table: DiskTable::from_parts([(path.to_path_buf(), length)]),
        })
    }

    /// Returns true for a split archive.
    pub fn is_split(&self) -> bool {
        matches!(self, UnifiedReader::Split(_))
    }

    /// Naming convention, for split archives.
    pub fn naming(&self) -> Option<SplitNaming> {
        match self {
            UnifiedReader::Single { .. } => None,
            UnifiedReader::Split(r) => Some(r.naming()),
        }
    }

    /// The disk table. A single file is one disk.
    pub fn table(&self) -> &DiskTable {
        match self {
            UnifiedReader::Single { table, .. } => table,
            UnifiedReader::Split(r) => r.table(),
        }
    }

    /// Paths of every physical file, in disk order.
    pub fn volume_paths(&self) -> Vec<PathBuf> {
        self.table().paths()
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            UnifiedReader::Single { reader, .. } => reader.read(buf),
            UnifiedReader::Split(r) => r.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            UnifiedReader::Single { reader, .. } => reader.seek(pos),
            UnifiedReader::Split(r) => r.seek(pos),
        }
    }
}

impl std::fmt::Debug for UnifiedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnifiedReader::Single { table, .. } => f
                .debug_struct("UnifiedReader::Single")
                .field("length", &table.total_length())
                .finish(),
            UnifiedReader::Split(r) => f
                .debug_struct("UnifiedReader::Split")
                .field("naming", &r.naming())
                .field("disks", &r.table().len())
                .finish(),
        }
    }
}
