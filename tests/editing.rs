//! Entry removal tests.

mod common;

use std::io::{Cursor, Write};
use std::path::Path;

use tempfile::tempdir;
use zipkit::{Archive, CompressionMethod, EntryOptions, Error, Writer, remove_entries};

fn write_five(path: &Path) -> Vec<(String, Vec<u8>)> {
    let entries: Vec<(String, Vec<u8>)> = (0..5)
        .map(|i| (format!("file{i}.txt"), common::text_bytes(1000 + i * 777)))
        .collect();
    let mut writer = Writer::create_path(path).unwrap();
    for (i, (name, data)) in entries.iter().enumerate() {
        if i % 2 == 0 {
            writer.add_bytes(name.as_str(), data, &EntryOptions::default()).unwrap();
        } else {
            // Streamed entries go through the patched-header path.
            writer.start_entry(name.as_str(), &EntryOptions::default()).unwrap();
            writer.write_all(data).unwrap();
            writer.close_entry().unwrap();
        }
    }
    writer.finish().unwrap();
    entries
}

/// Asserts that every local header starts where the previous entry's
/// record ended.
fn assert_contiguous(bytes: &[u8]) {
    let archive = Archive::open(Cursor::new(bytes)).unwrap();
    let mut expected = 0u64;
    for entry in archive.entries() {
        assert_eq!(entry.local_header_offset, expected, "gap before {}", entry.name);
        let at = expected as usize;
        assert_eq!(common::u32_at(bytes, at), 0x0403_4b50);
        let name_len = common::u16_at(bytes, at + 26) as u64;
        let extra_len = common::u16_at(bytes, at + 28) as u64;
        expected += 30 + name_len + extra_len + entry.compressed_size;
        if entry.data_descriptor {
            let descriptor = if entry.zip64 { 24 } else { 16 };
            expected += descriptor;
        }
    }
    // The central directory follows the last record.
    assert_eq!(common::u32_at(bytes, expected as usize), 0x0201_4b50);
}

#[test]
fn test_remove_one_of_five() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("five.zip");
    let entries = write_five(&path);
    let before = std::fs::read(&path).unwrap();
    assert_contiguous(&before);

    let result = remove_entries(&path, &["file2.txt"]).unwrap();
    assert_eq!(result.entries_kept, 4);
    assert_eq!(result.entries_removed, 1);
    assert!(result.bytes_reclaimed() > 0);

    let after = std::fs::read(&path).unwrap();
    assert_eq!(after.len() as u64, result.archive_size);
    assert_contiguous(&after);

    let mut archive = Archive::open(Cursor::new(&after)).unwrap();
    let names: Vec<&str> = archive.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["file0.txt", "file1.txt", "file3.txt", "file4.txt"]);
    assert!(archive.entry("file2.txt").is_none());
    let expected: Vec<(&str, &[u8])> = entries
        .iter()
        .filter(|(name, _)| name != "file2.txt")
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect();
    common::verify_opened(&mut archive, &expected);
}

#[test]
fn test_remove_first_and_last() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ends.zip");
    write_five(&path);

    remove_entries(&path, &["file0.txt", "file4.txt"]).unwrap();
    let after = std::fs::read(&path).unwrap();
    assert_contiguous(&after);
    assert_eq!(Archive::open(Cursor::new(&after)).unwrap().len(), 3);
}

#[test]
fn test_remove_everything_leaves_empty_archive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("all.zip");
    let entries = write_five(&path);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();

    let result = remove_entries(&path, &names).unwrap();
    assert_eq!(result.entries_kept, 0);
    assert_eq!(std::fs::read(&path).unwrap().len(), 22);
}

#[test]
fn test_unknown_name_leaves_archive_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keep.zip");
    write_five(&path);
    let before = std::fs::read(&path).unwrap();

    let err = remove_entries(&path, &["file1.txt", "nope.txt"]).unwrap_err();
    assert!(matches!(err, Error::EntryNotFound { ref name } if name == "nope.txt"));
    assert_eq!(std::fs::read(&path).unwrap(), before);
    // No temporary files are left behind.
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn test_encrypted_entries_are_copied_verbatim() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("locked.zip");
    let opts = EntryOptions::new()
        .compression(CompressionMethod::Store)
        .encryption(zipkit::EncryptionMethod::ZipCrypto)
        .password(zipkit::Password::new("pw"));
    let mut writer = Writer::create_path(&path).unwrap();
    writer.add_bytes("a", b"alpha", &opts).unwrap();
    writer.add_bytes("b", b"bravo", &opts).unwrap();
    writer.finish().unwrap();

    remove_entries(&path, &["a"]).unwrap();
    let mut archive = Archive::open_path(&path).unwrap();
    archive.set_password(zipkit::Password::new("pw"));
    assert_eq!(archive.extract_to_vec("b").unwrap(), b"bravo");
}

#[test]
fn test_remove_then_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cycle.zip");
    write_five(&path);
    remove_entries(&path, &["file3.txt"]).unwrap();

    let mut writer = Writer::append_path(&path).unwrap();
    writer.add_bytes("new.txt", b"fresh", &EntryOptions::default()).unwrap();
    writer.finish().unwrap();

    let after = std::fs::read(&path).unwrap();
    assert_contiguous(&after);
    let mut archive = Archive::open(Cursor::new(&after)).unwrap();
    assert_eq!(archive.len(), 5);
    assert_eq!(archive.extract_to_vec("new.txt").unwrap(), b"fresh");
}
