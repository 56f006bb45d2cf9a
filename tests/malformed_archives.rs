//! Malformed archive handling.
//!
//! Corrupt, truncated or hostile input must produce an error, never a panic
//! or an unbounded allocation.

mod common;

use std::io::Cursor;

use proptest::prelude::*;
use zipkit::{Archive, CompressionMethod, EntryOptions, Error};

fn sample_archive() -> Vec<u8> {
    let text = common::text_bytes(3000);
    let opts = EntryOptions::new().compression(CompressionMethod::Store);
    common::create_archive_with_result(None, &opts, &[("a.txt", text.as_slice()), ("b.txt", b"bee".as_slice())])
        .unwrap()
        .0
}

/// Opens `bytes` and extracts every entry, returning the first error.
fn open_and_extract(bytes: Vec<u8>) -> zipkit::Result<()> {
    let mut archive = Archive::open(Cursor::new(bytes))?;
    let names: Vec<String> = archive.entries().iter().map(|e| e.name.clone()).collect();
    for name in names {
        archive.extract_to_vec(&name)?;
    }
    Ok(())
}

#[test]
fn test_empty_input() {
    assert!(open_and_extract(Vec::new()).is_err());
}

#[test]
fn test_missing_trailer() {
    let mut bytes = sample_archive();
    bytes.truncate(bytes.len() - 22);
    let err = open_and_extract(bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)), "{err}");
}

#[test]
fn test_every_truncation_is_an_error() {
    let bytes = sample_archive();
    for len in 0..bytes.len() {
        assert!(open_and_extract(bytes[..len].to_vec()).is_err(), "truncated to {len}");
    }
}

#[test]
fn test_bad_central_signature() {
    let mut bytes = sample_archive();
    let eocd = bytes.len() - 22;
    let cd_offset = common::u32_at(&bytes, eocd + 16) as usize;
    bytes[cd_offset] ^= 0xFF;
    assert!(open_and_extract(bytes).is_err());
}

#[test]
fn test_central_directory_offset_out_of_range() {
    let mut bytes = sample_archive();
    let eocd = bytes.len() - 22;
    bytes[eocd + 16..eocd + 20].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(open_and_extract(bytes).is_err());
}

#[test]
fn test_inflated_entry_count() {
    let mut bytes = sample_archive();
    let eocd = bytes.len() - 22;
    bytes[eocd + 8..eocd + 10].copy_from_slice(&0xFFF0u16.to_le_bytes());
    bytes[eocd + 10..eocd + 12].copy_from_slice(&0xFFF0u16.to_le_bytes());
    assert!(open_and_extract(bytes).is_err());
}

#[test]
fn test_local_header_disagrees_with_central() {
    let mut bytes = sample_archive();
    // Break the first local header's signature.
    bytes[0] = b'X';
    let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
    assert!(archive.extract_to_vec("a.txt").is_err());
    assert_eq!(archive.extract_to_vec("b.txt").unwrap(), b"bee");
}

#[test]
fn test_corrupted_data_fails_crc() {
    let mut bytes = sample_archive();
    // First entry's data starts after the 30-byte header and 5-byte name.
    bytes[30 + 5 + 10] ^= 0x55;
    let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
    let err = archive.extract_to_vec("a.txt").unwrap_err();
    assert!(matches!(err, Error::CrcMismatch { ref entry_name, .. } if entry_name == "a.txt"), "{err}");
}

#[test]
fn test_comment_length_past_end() {
    let mut bytes = sample_archive();
    let eocd = bytes.len() - 22;
    bytes[eocd + 20..eocd + 22].copy_from_slice(&100u16.to_le_bytes());
    assert!(open_and_extract(bytes).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn random_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let _ = open_and_extract(data);
    }

    #[test]
    fn random_corruption_never_panics(
        flips in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8),
    ) {
        let mut bytes = sample_archive();
        let len = bytes.len();
        for (index, value) in flips {
            bytes[index.index(len)] = value;
        }
        let _ = open_and_extract(bytes);
    }
}
