//! Central directory and trailer assembly.
//!
//! Runs once, after the last entry is closed. Every offset written here is
//! taken from the sink at the moment the record is written, and the
//! recorded central directory size is checked against the bytes the sink
//! actually advanced.

use std::io::Write;

use crate::format::trailer::{
    EndOfCentralDirectory, TrailerValues, Zip64EndOfCentralDirectory, Zip64Locator,
};
use crate::format::{EOCD_SIZE, ZIP64_EOCD_SIZE, ZIP64_LOCATOR_SIZE};
use crate::model::ZipModel;
use crate::volume::VolumeWriter;
use crate::{Error, Result};

/// What [`write_central_directory`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectorySummary {
    /// Archive-level values as recorded (full width).
    pub values: TrailerValues,
    /// Absolute offset of the first central directory header.
    pub cd_absolute_offset: u64,
    /// A ZIP64 EOCD record and locator were written.
    pub zip64: bool,
    /// Number of disks the archive spans.
    pub total_disks: u32,
}

/// Writes the central directory for `model`, then the ZIP64 trailer when
/// needed or `force_zip64` is set, then the EOCD.
///
/// The model's trailer fields (`cd_offset`, `cd_size`, `cd_start_disk`,
/// `total_disks`, `zip64`) are updated to what was written.
///
/// # Errors
///
/// Returns [`Error::InvariantViolation`] if the sink's position disagrees
/// with the bytes this function wrote.
pub fn write_central_directory<V: VolumeWriter>(
    sink: &mut V,
    model: &mut ZipModel,
    force_zip64: bool,
) -> Result<CentralDirectorySummary> {
    let mut headers = Vec::with_capacity(model.len());
    let mut any_entry_zip64 = false;
    for entry in model.iter() {
        let header = entry.to_central();
        any_entry_zip64 |= header.needs_zip64();
        headers.push(header.encode()?);
    }

    let first_len = headers.first().map_or(0, |h| h.len() as u64);
    sink.ensure_room(first_len)?;
    let cd_absolute_offset = sink.position();
    let cd_start_disk = sink.current_disk();
    let cd_offset = sink.disk_offset();

    let mut cd_size = 0u64;
    let mut counting_disk = cd_start_disk;
    let mut entries_on_disk = 0u64;
    for header in &headers {
        sink.ensure_room(header.len() as u64)?;
        if sink.current_disk() != counting_disk {
            counting_disk = sink.current_disk();
            entries_on_disk = 0;
        }
        sink.write_all(header)?;
        entries_on_disk += 1;
        cd_size += header.len() as u64;
    }

    let advanced = sink.position() - cd_absolute_offset;
    if advanced != cd_size {
        return Err(Error::invariant(format!(
            "central directory occupies {} bytes but {} were recorded",
            advanced, cd_size
        )));
    }

    let comment = model.comment.clone();
    let total_entries = headers.len() as u64;
    let provisional = TrailerValues {
        disk_number: counting_disk,
        cd_start_disk,
        entries_on_disk,
        total_entries,
        cd_size,
        cd_offset,
    };
    let mut zip64 = force_zip64 || any_entry_zip64 || provisional.needs_zip64();

    let trailer_len = |zip64: bool| {
        let classic = EOCD_SIZE + comment.len() as u64;
        if zip64 {
            classic + ZIP64_EOCD_SIZE + ZIP64_LOCATOR_SIZE
        } else {
            classic
        }
    };
    sink.ensure_room(trailer_len(zip64))?;
    let disk_number = sink.current_disk();
    if disk_number != counting_disk {
        entries_on_disk = 0;
    }
    let values = TrailerValues {
        disk_number,
        entries_on_disk,
        ..provisional
    };
    if !zip64 && values.needs_zip64() {
        // A rollover pushed the disk number past the classic field.
        zip64 = true;
        sink.ensure_room(trailer_len(true))?;
    }

    if zip64 {
        let record_offset = sink.disk_offset();
        let record_disk = sink.current_disk();
        sink.write_all(&Zip64EndOfCentralDirectory::new(values).encode()?)?;
        let locator = Zip64Locator {
            zip64_eocd_disk: record_disk,
            zip64_eocd_offset: record_offset,
            total_disks: values.disk_number + 1,
        };
        sink.write_all(&locator.encode()?)?;
    }
    sink.write_all(&EndOfCentralDirectory::from_values(&values, comment).encode()?)?;

    model.cd_offset = cd_absolute_offset;
    model.cd_size = cd_size;
    model.cd_start_disk = cd_start_disk;
    model.total_disks = values.disk_number + 1;
    model.zip64 = zip64;

    log::debug!(
        "wrote central directory: {} entries, {} bytes at offset {}{}",
        total_entries,
        cd_size,
        cd_absolute_offset,
        if zip64 { " (zip64)" } else { "" }
    );

    Ok(CentralDirectorySummary {
        values,
        cd_absolute_offset,
        zip64,
        total_disks: values.disk_number + 1,
    })
}
