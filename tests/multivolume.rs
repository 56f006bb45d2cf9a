//! Split archive integration tests.
//!
//! These tests verify:
//! - Writing PKWARE (`.z01` ... `.zip`) and numbered (`.001` ...) sets
//! - The disk table's absolute/relative offset mapping
//! - Reading entries whose data crosses a part boundary
//! - Detection of incomplete sets

mod common;

use std::io::Write;
use std::path::Path;

use tempfile::tempdir;
use zipkit::volume::{DiskTable, SplitConfig, SplitNaming};
use zipkit::{Archive, CompressionMethod, EntryOptions, Error, Writer};

const MIB: u64 = 1024 * 1024;

fn store() -> EntryOptions {
    EntryOptions::new().compression(CompressionMethod::Store)
}

/// Writes `entries` as a split archive and returns the write result's
/// volume count.
fn write_split(path: &Path, naming: SplitNaming, size: u64, entries: &[(&str, &[u8])]) -> u32 {
    let config = SplitConfig::new(size).unwrap().naming(naming);
    let mut writer = Writer::create_split(path, config).unwrap();
    for (name, data) in entries {
        writer.add_bytes(*name, data, &store()).unwrap();
    }
    let result = writer.finish().unwrap();
    result.volume_count
}

#[test]
fn test_disk_table_offsets() {
    let table = DiskTable::from_parts([("a.z01", MIB), ("a.z02", MIB), ("a.zip", MIB)]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.total_length(), 3 * MIB);
    let disks = table.disks();
    assert_eq!(disks[1].absolute_offset, MIB);
    assert_eq!(disks[2].absolute_offset, 2 * MIB);
    assert!(disks[2].last);
    assert!(!disks[0].last && !disks[1].last);

    assert_eq!(table.locate(1_048_580), Some((1, 4)));
    assert_eq!(table.absolute(1, 4).unwrap(), 1_048_580);
    assert_eq!(table.locate(3 * MIB), None);
    assert!(table.absolute(3, 0).is_err());
    assert!(table.absolute(0, MIB + 1).is_err());
}

#[test]
fn test_pkware_split_of_three_mebibytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("big.zip");
    // Leave room for headers and the central directory so the set fills
    // exactly three parts.
    let payload = common::random_bytes((3 * MIB - 4096) as usize, 3);
    let volumes = write_split(&path, SplitNaming::Pkware, MIB, &[("payload.bin", payload.as_slice())]);
    assert_eq!(volumes, 3);

    assert!(path.with_extension("z01").is_file());
    assert!(path.with_extension("z02").is_file());
    assert!(!path.with_extension("z03").exists());
    // The first part opens with the split marker.
    let first = std::fs::read(path.with_extension("z01")).unwrap();
    assert_eq!(common::u32_at(&first, 0), 0x0807_4b50);

    let mut archive = Archive::open_path(&path).unwrap();
    assert!(archive.is_split());
    let disks = archive.disks().to_vec();
    assert_eq!(disks.len(), 3);
    assert!(disks[2].last);
    assert_eq!(disks[0].length, MIB);
    assert_eq!(disks[1].length, MIB);
    assert_eq!(disks[1].absolute_offset, MIB);
    assert_eq!(archive.volume_paths()[2], path);
    assert_eq!(archive.model().total_disks, 3);

    assert_eq!(archive.extract_to_vec("payload.bin").unwrap(), payload);
}

#[test]
fn test_pkware_set_on_one_part_starts_with_pk00() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("small.zip");
    let text = common::text_bytes(2000);
    let volumes = write_split(&path, SplitNaming::Pkware, MIB, &[("note.txt", text.as_slice())]);
    assert_eq!(volumes, 1);
    assert!(!path.with_extension("z01").exists());

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], b"PK00");
    let mut archive = Archive::open_path(&path).unwrap();
    assert_eq!(archive.extract_to_vec("note.txt").unwrap(), text);
}

#[test]
fn test_pkware_entries_record_their_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("many.zip");
    let chunk = common::random_bytes(40_000, 9);
    let names: Vec<String> = (0..6).map(|i| format!("part{i}.bin")).collect();
    let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), chunk.as_slice())).collect();
    let volumes = write_split(&path, SplitNaming::Pkware, 64 * 1024, &entries);
    assert!(volumes >= 4);

    let mut archive = Archive::open_path(&path).unwrap();
    let last = archive.entry("part5.bin").unwrap();
    assert!(last.disk_number > 0);
    assert!(last.local_header_offset < 64 * 1024);
    common::verify_opened(&mut archive, &entries);
}

#[test]
fn test_numbered_split_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("set.zip");
    let payload = common::random_bytes(200_000, 11);
    let text = common::text_bytes(30_000);
    let volumes = write_split(
        &path,
        SplitNaming::Numbered,
        64 * 1024,
        &[("noise.bin", payload.as_slice()), ("text.txt", text.as_slice())],
    );
    assert!(volumes >= 4);
    assert!(dir.path().join("set.zip.001").is_file());
    assert!(!path.exists());

    for open_as in [path.clone(), dir.path().join("set.zip.001"), dir.path().join("set.zip.003")] {
        let mut archive = Archive::open_path(&open_as).unwrap();
        assert!(archive.is_split());
        assert_eq!(archive.disks().len(), volumes as usize);
        // Numbered sets record absolute offsets on disk 0.
        assert!(archive.entries().iter().all(|e| e.disk_number == 0));
        common::verify_opened(
            &mut archive,
            &[("noise.bin", payload.as_slice()), ("text.txt", text.as_slice())],
        );
    }
}

#[test]
fn test_streamed_entry_across_parts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("streamed.zip");
    let payload = common::random_bytes(300_000, 5);

    let config = SplitConfig::new(64 * 1024).unwrap();
    let mut writer = Writer::create_split(&path, config).unwrap();
    writer.start_entry("stream.bin", &store()).unwrap();
    writer.write_all(&payload).unwrap();
    writer.close_entry().unwrap();
    writer.finish().unwrap();

    let mut archive = Archive::open_path(&path).unwrap();
    assert!(archive.entry("stream.bin").unwrap().data_descriptor);
    assert_eq!(archive.extract_to_vec("stream.bin").unwrap(), payload);
}

#[test]
fn test_missing_part_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gap.zip");
    let payload = common::random_bytes(200_000, 2);
    write_split(&path, SplitNaming::Pkware, 64 * 1024, &[("p", payload.as_slice())]);
    std::fs::remove_file(path.with_extension("z02")).unwrap();

    let err = Archive::open_path(&path).unwrap_err();
    assert!(matches!(err, Error::VolumeMissing { volume: 2, .. }), "{err:?}");
}

#[test]
fn test_split_archives_cannot_be_edited_in_place() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fixed.zip");
    let payload = common::random_bytes(150_000, 4);
    write_split(&path, SplitNaming::Pkware, 64 * 1024, &[("p", payload.as_slice()), ("q", b"q".as_slice())]);

    let err = zipkit::remove_entries(&path, &["q"]).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature { .. }));
    let err = common::expect_err(Writer::append_path(&path));
    assert!(matches!(err, Error::UnsupportedFeature { .. }));
}

#[test]
fn test_split_size_minimum() {
    assert!(SplitConfig::new(64 * 1024).is_ok());
    assert!(SplitConfig::new(64 * 1024 - 1).is_err());
}
