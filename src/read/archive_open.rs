//! Archive opening: trailer scan and central directory parsing.

use std::io::{Read, Seek};
use std::path::Path;

use crate::format::central::read_central_directory;
use crate::format::trailer::read_trailer;
use crate::model::{Entry, ZipModel};
use crate::volume::{DiskTable, SplitNaming, UnifiedReader};
use crate::{Error, Result};

use super::{Archive, resolve_in};

impl<R: Read + Seek> Archive<R> {
    /// Opens an archive from any seekable reader.
    ///
    /// All offsets are taken as absolute positions in `reader`. Use
    /// [`open_path`](Archive::open_path) for split archives.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFormat`] if no End-of-Central-Directory record is
    ///   found or the trailer is inconsistent.
    /// - [`Error::SignatureMismatch`] or [`Error::CorruptHeader`] for a
    ///   damaged central directory.
    /// - [`Error::EntryExists`] if two entries share a name.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::io::Cursor;
    /// use zipkit::{Archive, EntryOptions, Writer};
    ///
    /// let mut writer = Writer::new(Cursor::new(Vec::new()))?;
    /// writer.add_bytes("hello.txt", b"hi", &EntryOptions::default())?;
    /// let (_, cursor) = writer.finish_into_inner()?;
    ///
    /// let archive = Archive::open(Cursor::new(cursor.into_inner()))?;
    /// assert_eq!(archive.len(), 1);
    /// # Ok::<(), zipkit::Error>(())
    /// ```
    pub fn open(reader: R) -> Result<Self> {
        Self::load(reader, DiskTable::default(), None)
    }

    pub(crate) fn load(
        mut reader: R,
        table: DiskTable,
        naming: Option<SplitNaming>,
    ) -> Result<Self> {
        let model = read_model(&mut reader, &table, naming)?;
        Ok(Self {
            reader,
            model,
            table,
            naming,
            password: None,
        })
    }
}

impl Archive<UnifiedReader> {
    /// Opens an archive file.
    ///
    /// Split archives are detected from sibling files: `name.z01`,
    /// `name.z02`, ... next to `name.zip`, or `name.zip.001`, `name.zip.002`,
    /// ... Any part of a numbered set may be passed.
    ///
    /// # Errors
    ///
    /// As [`open`](Archive::open), plus [`Error::Io`] if the file cannot be
    /// opened and [`Error::VolumeMissing`] for an incomplete split set.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = UnifiedReader::open(path)?;
        let table = reader.table().clone();
        let naming = reader.naming();
        let archive = Self::load(reader, table, naming)?;
        log::debug!(
            "opened {}: {} entries, {} disk(s){}",
            path.display(),
            archive.model.len(),
            archive.model.total_disks,
            if archive.model.zip64 { ", zip64" } else { "" }
        );
        Ok(archive)
    }
}

fn read_model<R: Read + Seek>(
    reader: &mut R,
    table: &DiskTable,
    naming: Option<SplitNaming>,
) -> Result<ZipModel> {
    let resolve = |disk: u32, offset: u64| resolve_in(naming, table, disk, offset);

    let trailer = read_trailer(reader, resolve)?;
    let values = trailer.values();
    let total_disks = trailer.total_disks();
    if naming.is_none() && !table.is_empty() && total_disks > 1 {
        return Err(Error::InvalidFormat(format!(
            "archive spans {} disks but only one file was found",
            total_disks
        )));
    }
    if values.cd_start_disk > values.disk_number {
        return Err(Error::InvalidFormat(format!(
            "central directory starts on disk {} after the last disk {}",
            values.cd_start_disk, values.disk_number
        )));
    }

    let cd_offset = resolve(values.cd_start_disk, values.cd_offset)?;
    if cd_offset > trailer.eocd_offset {
        return Err(Error::InvalidFormat(format!(
            "central directory offset {} is past the trailer at {}",
            cd_offset, trailer.eocd_offset
        )));
    }
    let cd = read_central_directory(reader, cd_offset, values.total_entries)?;
    if cd.size != values.cd_size {
        log::warn!(
            "central directory is {} bytes but the trailer records {}",
            cd.size,
            values.cd_size
        );
    }

    let mut model = ZipModel::new();
    for header in cd.headers {
        model.push(Entry::from_central(header, cd_offset)?)?;
    }
    model.comment = trailer.comment().to_vec();
    model.zip64 = trailer.zip64.is_some();
    model.total_disks = total_disks;
    model.cd_start_disk = values.cd_start_disk;
    model.cd_offset = cd_offset;
    model.cd_size = cd.size;
    model.digital_signature = cd.digital_signature;
    log::trace!(
        "central directory: {} entries at {} ({} bytes)",
        model.len(),
        cd_offset,
        cd.size
    );
    Ok(model)
}
