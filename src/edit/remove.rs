//! Entry removal through a temporary file and an atomic rename.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::format::extra::ExtraField;
use crate::format::local::{DataDescriptor, LocalFileHeader};
use crate::format::reader::read_fixed;
use crate::format::zip64::SENTINEL_U32;
use crate::format::LOCAL_FILE_HEADER_SIZE;
use crate::model::{Entry, ZipModel};
use crate::read::Archive;
use crate::volume::{SeekableVolume, VolumeWriter};
use crate::write::write_central_directory;
use crate::{Error, Result};

const TEMP_PREFIX: &str = ".zipkit-";

/// Outcome of [`remove_entries`].
#[must_use = "edit result should be checked to verify operation completed as expected"]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditResult {
    /// Entries copied into the new archive.
    pub entries_kept: usize,
    /// Entries dropped.
    pub entries_removed: usize,
    /// Size of the archive before the edit.
    pub original_size: u64,
    /// Size of the rewritten archive.
    pub archive_size: u64,
}

impl EditResult {
    /// Bytes saved by the rewrite.
    pub fn bytes_reclaimed(&self) -> u64 {
        self.original_size.saturating_sub(self.archive_size)
    }
}

/// Removes the named entries from the archive at `path`.
///
/// The archive is rewritten into a temporary file in the same directory,
/// which then replaces the original in one rename. If anything fails after
/// the temporary file is created, the original is untouched and the
/// temporary file is left next to it for inspection; its location is
/// logged at `warn` level.
///
/// A digital signature record is not carried over.
///
/// # Errors
///
/// - [`Error::EntryNotFound`] if any name is not in the archive. Nothing is
///   written in that case.
/// - [`Error::UnsupportedFeature`] for split archives.
/// - Any error from [`Archive::open_path`] or from copying entry records.
pub fn remove_entries<P, S>(path: P, names: &[S]) -> Result<EditResult>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let mut archive = Archive::open_path(path)?;
    if archive.is_split() {
        return Err(Error::UnsupportedFeature {
            feature: "removing entries from a split archive",
        });
    }
    let doomed: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
    if let Some(missing) = doomed.iter().find(|name| archive.entry(name).is_none()) {
        return Err(Error::EntryNotFound {
            name: missing.to_string(),
        });
    }
    let original_size = archive.disks().iter().map(|d| d.length).sum();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let model = match rewrite(&mut archive, &doomed, temp.as_file_mut()) {
        Ok(model) => model,
        Err(err) => {
            keep_for_diagnosis(temp, path, &err);
            return Err(err);
        }
    };

    let result = EditResult {
        entries_kept: model.len(),
        entries_removed: doomed.len(),
        original_size,
        archive_size: temp.as_file().metadata()?.len(),
    };
    // Release the original before replacing it.
    drop(archive);

    if let Err(tempfile::PersistError { error, file }) = temp.persist(path) {
        let error = Error::from(error);
        keep_for_diagnosis(file, path, &error);
        return Err(error);
    }

    log::debug!(
        "removed {} entries from {}; {} kept, {} -> {} bytes",
        result.entries_removed,
        path.display(),
        result.entries_kept,
        result.original_size,
        result.archive_size
    );
    Ok(result)
}

/// Writes the kept entries and a fresh central directory to `file`.
fn rewrite<R: Read + Seek>(
    archive: &mut Archive<R>,
    doomed: &HashSet<&str>,
    file: &mut File,
) -> Result<ZipModel> {
    let mut model = ZipModel::new();
    model.comment = archive.model.comment.clone();
    let force_zip64 = archive.model.zip64;
    let mut sink = SeekableVolume::new(BufWriter::new(&mut *file))?;
    for entry in archive.model.entries() {
        if doomed.contains(entry.name.as_str()) {
            log::trace!("dropping '{}'", entry.name);
            continue;
        }
        let offset = sink.position();
        copy_record(&mut archive.reader, entry, &mut sink)?;
        let mut kept = entry.clone();
        kept.local_header_offset = offset;
        kept.disk_number = 0;
        model.push(kept)?;
    }
    write_central_directory(&mut sink, &mut model, force_zip64)?;
    sink.finish_volume()?
        .into_inner()
        .map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(model)
}

/// Leaves a partial or unplaced rewrite on disk and logs where it is.
fn keep_for_diagnosis(temp: NamedTempFile, path: &Path, err: &Error) {
    match temp.keep() {
        Ok((_, kept)) => log::warn!(
            "rewriting {} failed: {}; temporary file kept at {}",
            path.display(),
            err,
            kept.display()
        ),
        Err(e) => log::warn!(
            "rewriting {} failed: {}; temporary file could not be kept: {}",
            path.display(),
            err,
            e.error
        ),
    }
}

/// Copies one entry's local header, stored data and Data Descriptor
/// unchanged to `sink`.
fn copy_record<R, W>(reader: &mut R, entry: &Entry, sink: &mut W) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    let span = LocalFileHeader::read_span(reader, entry.local_header_offset)?;
    reader.seek(SeekFrom::Start(span.offset))?;
    let header = read_fixed(reader, span.header_len() as usize, span.offset, "local file header")?;
    sink.write_all(&header)?;

    let copied = io::copy(&mut reader.by_ref().take(entry.compressed_size), sink)?;
    if copied != entry.compressed_size {
        return Err(Error::corrupt_header(
            span.data_offset(),
            format!(
                "entry '{}' has {} of {} stored bytes",
                entry.name, copied, entry.compressed_size
            ),
        ));
    }

    if entry.data_descriptor {
        let descriptor_offset = span.data_offset() + entry.compressed_size;
        let extra_start = LOCAL_FILE_HEADER_SIZE as usize + span.name_len as usize;
        let local_zip64 = ExtraField::parse(&header[extra_start..], span.offset + extra_start as u64)
            .is_ok_and(|extra| extra.zip64_payload().is_some());
        let zip64 = local_zip64
            || entry.compressed_size >= SENTINEL_U32 as u64
            || entry.uncompressed_size >= SENTINEL_U32 as u64;
        let (descriptor, _) = DataDescriptor::read(reader, descriptor_offset, zip64)?;
        descriptor.write(sink)?;
    }
    Ok(())
}
