//! Reading split archives as one address space.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::config::{SplitNaming, numbered_part_path, pkware_part_path};
use super::disk::DiskTable;
use crate::format::reader::read_fixed;
use crate::format::trailer::{EndOfCentralDirectory, Zip64Locator, find_eocd};
use crate::format::{EOCD_SIZE, ZIP64_LOCATOR_SIGNATURE, ZIP64_LOCATOR_SIZE};
use crate::{Error, Result};

/// A reader that reads seamlessly across the disks of a split archive.
///
/// Disk files are opened lazily, on first access. A read that crosses a
/// disk boundary continues on the next disk.
pub struct SplitReader {
    table: DiskTable,
    naming: SplitNaming,
    volumes: Vec<Option<BufReader<File>>>,
    position: u64,
}

impl SplitReader {
    /// Creates a reader over an already discovered disk table.
    pub fn new(table: DiskTable, naming: SplitNaming) -> Self {
        let volumes = (0..table.len()).map(|_| None).collect();
        Self {
            table,
            naming,
            volumes,
            position: 0,
        }
    }

    /// Discovers the split set that `path` belongs to and opens it.
    ///
    /// Returns `Ok(None)` if `path` is an ordinary single-file archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Option<Self>> {
        Ok(discover(path.as_ref())?.map(|(naming, table)| Self::new(table, naming)))
    }

    /// The disk table.
    pub fn table(&self) -> &DiskTable {
        &self.table
    }

    /// The naming convention of the set.
    pub fn naming(&self) -> SplitNaming {
        self.naming
    }

    fn open_volume(&mut self, index: usize) -> Result<&mut BufReader<File>> {
        let slot = &mut self.volumes[index];
        if slot.is_none() {
            let disk = &self.table.disks()[index];
            log::trace!("opening disk {} at {}", disk.number, disk.path.display());
            let file = File::open(&disk.path).map_err(|e| Error::VolumeMissing {
                volume: disk.number + 1,
                path: disk.path.display().to_string(),
                source: e,
            })?;
            *slot = Some(BufReader::new(file));
        }
        slot.as_mut()
            .ok_or_else(|| Error::invariant("disk handle vanished after opening"))
    }
}

impl Read for SplitReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let Some((disk, relative)) = self.table.locate(self.position) else {
                break;
            };
            let length = self.table.disks()[disk as usize].length;
            let available = length - relative;
            if available == 0 {
                // End of the last disk.
                break;
            }
            let want = (buf.len() - filled).min(usize::try_from(available).unwrap_or(usize::MAX));
            let volume = self.open_volume(disk as usize).map_err(io::Error::other)?;
            volume.seek(SeekFrom::Start(relative))?;
            let n = volume.read(&mut buf[filled..filled + want])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("disk {} is shorter than its recorded length", disk),
                ));
            }
            filled += n;
            self.position += n as u64;
        }
        Ok(filled)
    }
}

impl Seek for SplitReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let total = self.table.total_length() as i128;
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::End(p) => total + p as i128,
            SeekFrom::Current(p) => self.position as i128 + p as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot seek before start of stream",
            ));
        }
        self.position = (target.min(total)) as u64;
        Ok(self.position)
    }
}

impl std::fmt::Debug for SplitReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitReader")
            .field("naming", &self.naming)
            .field("disks", &self.table.len())
            .field("total_length", &self.table.total_length())
            .field("position", &self.position)
            .finish()
    }
}

fn missing(volume: u32, path: &Path) -> Error {
    Error::VolumeMissing {
        volume,
        path: path.display().to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "volume file not found"),
    }
}

/// Parses a numeric extension, e.g. `001` or `z05` with `prefix` "z".
fn numeric_suffix(ext: &str, prefix: &str) -> Option<u32> {
    let digits = ext.strip_prefix(prefix)?;
    if digits.len() < 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Indices of files in `dir` named `{stem}.{ext}` where `parse(ext)` matches.
fn sibling_indices(dir: &Path, stem: &str, parse: impl Fn(&str) -> Option<u32>) -> Result<Vec<u32>> {
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(rest) = name.strip_prefix(stem) else { continue };
        let Some(ext) = rest.strip_prefix('.') else { continue };
        if let Some(n) = parse(ext) {
            found.push(n);
        }
    }
    found.sort_unstable();
    Ok(found)
}

fn discover_numbered(archive: &Path) -> Result<DiskTable> {
    let dir = archive.parent().unwrap_or(Path::new(""));
    let stem = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidFormat("archive path has no file name".into()))?;
    let indices = sibling_indices(dir, stem, |ext| numeric_suffix(ext, ""))?;
    let max = indices.last().copied().unwrap_or(0);
    let mut paths = Vec::new();
    for number in 1..=max.max(1) {
        let path = numbered_part_path(archive, number - 1);
        if !path.is_file() {
            return Err(missing(number, &path));
        }
        paths.push(path);
    }
    DiskTable::from_paths(paths)
}

/// Reads the disk count declared by the trailer in the final PKWARE part.
fn pkware_disk_count(last: &Path) -> Result<u32> {
    let mut file = BufReader::new(File::open(last)?);
    let eocd_offset = find_eocd(&mut file)?;
    file.seek(SeekFrom::Start(eocd_offset))?;
    let buf = read_fixed(&mut file, EOCD_SIZE as usize, eocd_offset, "end of central directory")?;
    let eocd = EndOfCentralDirectory::parse(&buf, eocd_offset)?;
    if eocd.disk_number != u16::MAX {
        return Ok(eocd.disk_number as u32 + 1);
    }
    let locator_offset = eocd_offset.checked_sub(ZIP64_LOCATOR_SIZE).ok_or_else(|| {
        Error::corrupt_header(eocd_offset, "disk number sentinel without ZIP64 locator")
    })?;
    file.seek(SeekFrom::Start(locator_offset))?;
    let buf = read_fixed(&mut file, ZIP64_LOCATOR_SIZE as usize, locator_offset, "ZIP64 locator")?;
    if buf[..4] != ZIP64_LOCATOR_SIGNATURE.to_le_bytes() {
        return Err(Error::corrupt_header(
            locator_offset,
            "disk number sentinel without ZIP64 locator",
        ));
    }
    Ok(Zip64Locator::parse(&buf, locator_offset)?.total_disks.max(1))
}

fn discover_pkware(last: &Path) -> Result<DiskTable> {
    if !last.is_file() {
        let dir = last.parent().unwrap_or(Path::new(""));
        let stem = last.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let parts = sibling_indices(dir, stem, |ext| numeric_suffix(ext, "z"))?;
        return Err(missing(parts.last().copied().unwrap_or(0) + 1, last));
    }
    let count = pkware_disk_count(last)?;
    let mut paths: Vec<PathBuf> = Vec::with_capacity(count as usize);
    for disk in 0..count - 1 {
        let path = pkware_part_path(last, disk);
        if !path.is_file() {
            return Err(missing(disk + 1, &path));
        }
        paths.push(path);
    }
    paths.push(last.to_path_buf());
    DiskTable::from_paths(paths)
}

/// Works out whether `path` names part of a split set and, if so, builds
/// its disk table.
///
/// Accepted spellings: any numbered part (`a.zip.001`), the base of a
/// numbered set (`a.zip` when only its numbered parts exist), the final PKWARE
/// part (`a.zip` next to `a.z01`) or any PKWARE part (`a.z01`). Every part
/// the set declares must exist; the first absent one is reported as
/// [`Error::VolumeMissing`].
pub fn discover(path: &Path) -> Result<Option<(SplitNaming, DiskTable)>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

    if numeric_suffix(ext, "").is_some() && ext.len() >= 3 {
        let archive = path.with_extension("");
        return Ok(Some((SplitNaming::Numbered, discover_numbered(&archive)?)));
    }
    if numeric_suffix(&ext.to_ascii_lowercase(), "z").is_some() {
        let last = path.with_extension("zip");
        return Ok(Some((SplitNaming::Pkware, discover_pkware(&last)?)));
    }
    if !path.exists() && numbered_part_path(path, 0).is_file() {
        return Ok(Some((SplitNaming::Numbered, discover_numbered(path)?)));
    }
    if pkware_part_path(path, 0).is_file() {
        return Ok(Some((SplitNaming::Pkware, discover_pkware(path)?)));
    }
    Ok(None)
}
