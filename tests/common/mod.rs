//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::Cursor;

use rand::{Rng, SeedableRng, rngs::StdRng};
use zipkit::{Archive, EntryOptions, WriteOptions, WriteResult, Writer};

/// Creates an in-memory archive from `(name, data)` pairs, all written with
/// the same entry options.
///
/// Returns both the archive bytes and the WriteResult metadata.
pub fn create_archive_with_result(
    options: Option<WriteOptions>,
    entry_options: &EntryOptions,
    entries: &[(&str, &[u8])],
) -> zipkit::Result<(Vec<u8>, WriteResult)> {
    let writer = Writer::new(Cursor::new(Vec::new()))?;
    let mut writer = match options {
        Some(opts) => writer.options(opts),
        None => writer,
    };
    for (name, data) in entries {
        writer.add_bytes(*name, data, entry_options)?;
    }
    let (result, cursor) = writer.finish_into_inner()?;
    Ok((cursor.into_inner(), result))
}

/// Creates an in-memory archive with default options.
pub fn create_archive(entries: &[(&str, &[u8])]) -> zipkit::Result<Vec<u8>> {
    create_archive_with_result(None, &EntryOptions::default(), entries).map(|(bytes, _)| bytes)
}

/// Creates an in-memory archive whose entries are all streamed through
/// `start_entry` / `write` / `close_entry`.
pub fn create_streamed_archive(
    entry_options: &EntryOptions,
    entries: &[(&str, &[u8])],
) -> zipkit::Result<Vec<u8>> {
    use std::io::Write;

    let mut writer = Writer::new(Cursor::new(Vec::new()))?;
    for (name, data) in entries {
        writer.start_entry(*name, entry_options)?;
        // Uneven chunks exercise the pipeline's buffering.
        for chunk in data.chunks(7919) {
            writer.write_all(chunk)?;
        }
        writer.close_entry()?;
    }
    let (_, cursor) = writer.finish_into_inner()?;
    Ok(cursor.into_inner())
}

/// Extracts the error from a Result, panicking if it's Ok.
///
/// Useful when the Ok type doesn't implement Debug.
pub fn expect_err<T, E>(result: Result<T, E>) -> E {
    match result {
        Ok(_) => panic!("Expected error but got Ok"),
        Err(e) => e,
    }
}

/// Opens the archive and checks that it holds exactly the expected files
/// with the expected content.
pub fn verify_archive_contents(archive_bytes: &[u8], expected_entries: &[(&str, &[u8])]) {
    let mut archive =
        Archive::open(Cursor::new(archive_bytes)).expect("Failed to open archive for verification");
    verify_opened(&mut archive, expected_entries);
}

/// As [`verify_archive_contents`], for an archive that is already open.
pub fn verify_opened<R: std::io::Read + std::io::Seek>(
    archive: &mut Archive<R>,
    expected_entries: &[(&str, &[u8])],
) {
    let file_count = archive.entries().iter().filter(|e| !e.is_directory).count();
    assert_eq!(
        file_count,
        expected_entries.len(),
        "Entry count mismatch: expected {}, got {}",
        expected_entries.len(),
        file_count
    );
    for (name, expected_data) in expected_entries {
        let extracted = archive
            .extract_to_vec(name)
            .unwrap_or_else(|e| panic!("Failed to extract '{}': {}", name, e));
        assert_eq!(&extracted[..], *expected_data, "Content mismatch for '{}'", name);
    }
}

/// Incompressible bytes from a fixed seed.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// Highly compressible text.
pub fn text_bytes(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// Reads a little-endian u16 at `pos`.
pub fn u16_at(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

/// Reads a little-endian u32 at `pos`.
pub fn u32_at(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap())
}

/// Reads a little-endian u64 at `pos`.
pub fn u64_at(data: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes(data[pos..pos + 8].try_into().unwrap())
}
