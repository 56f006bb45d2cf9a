//! How entry sizes reach the archive: known up front, patched into the
//! local header, or deferred to a Data Descriptor.

mod common;

use std::io::{Cursor, Write};

use common::{u16_at, u32_at};
use zipkit::{Archive, CompressionMethod, EntryOptions, Error, Writer};

const LFH_SIGNATURE: u32 = 0x0403_4b50;
const CDFH_SIGNATURE: u32 = 0x0201_4b50;
const DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;

struct LocalFields {
    flags: u16,
    crc32: u32,
    compressed: u32,
    uncompressed: u32,
    data_offset: usize,
}

fn local_fields(data: &[u8], offset: usize) -> LocalFields {
    assert_eq!(u32_at(data, offset), LFH_SIGNATURE);
    let name_len = u16_at(data, offset + 26) as usize;
    let extra_len = u16_at(data, offset + 28) as usize;
    LocalFields {
        flags: u16_at(data, offset + 6),
        crc32: u32_at(data, offset + 14),
        compressed: u32_at(data, offset + 18),
        uncompressed: u32_at(data, offset + 22),
        data_offset: offset + 30 + name_len + extra_len,
    }
}

#[test]
fn test_known_size_store_entry_has_no_descriptor() {
    let mut writer = Writer::new_streaming(Vec::new());
    let opts = EntryOptions::new().compression(CompressionMethod::Store);
    writer.add_bytes("ten.bin", b"0123456789", &opts).unwrap();
    let (_, bytes) = writer.finish_into_inner().unwrap();

    let local = local_fields(&bytes, 0);
    assert_eq!(local.compressed, 10);
    assert_eq!(local.uncompressed, 10);
    assert_eq!(local.crc32, crc32fast::hash(b"0123456789"));
    assert_eq!(local.flags & DATA_DESCRIPTOR_FLAG, 0);
    // The central directory follows the data directly.
    assert_eq!(u32_at(&bytes, local.data_offset + 10), CDFH_SIGNATURE);

    let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
    assert!(!archive.entry("ten.bin").unwrap().data_descriptor);
    assert_eq!(archive.extract_to_vec("ten.bin").unwrap(), b"0123456789");
}

#[cfg(feature = "deflate")]
#[test]
fn test_streamed_deflate_entry_uses_descriptor() {
    let payload = common::text_bytes(50_000);
    let mut writer = Writer::new_streaming(Vec::new());
    let opts = EntryOptions::new().compression(CompressionMethod::Deflate);
    writer.start_entry("stream.txt", &opts).unwrap();
    for chunk in payload.chunks(4096) {
        writer.write_all(chunk).unwrap();
    }
    writer.close_entry().unwrap();
    let (_, bytes) = writer.finish_into_inner().unwrap();

    let local = local_fields(&bytes, 0);
    assert_ne!(local.flags & DATA_DESCRIPTOR_FLAG, 0);
    assert_eq!(local.crc32, 0);
    assert_eq!(local.compressed, 0);
    assert_eq!(local.uncompressed, 0);

    let mut archive = Archive::open(Cursor::new(bytes.clone())).unwrap();
    let entry = archive.entry("stream.txt").unwrap().clone();
    assert!(entry.data_descriptor);
    assert_eq!(entry.uncompressed_size, payload.len() as u64);
    assert!(entry.compressed_size < entry.uncompressed_size);

    let descriptor = local.data_offset + entry.compressed_size as usize;
    assert_eq!(u32_at(&bytes, descriptor), DESCRIPTOR_SIGNATURE);
    assert_eq!(u32_at(&bytes, descriptor + 4), crc32fast::hash(&payload));
    assert_eq!(u32_at(&bytes, descriptor + 8) as u64, entry.compressed_size);
    assert_eq!(u32_at(&bytes, descriptor + 12) as u64, entry.uncompressed_size);
    assert_eq!(u32_at(&bytes, descriptor + 16), CDFH_SIGNATURE);

    assert_eq!(archive.extract_to_vec("stream.txt").unwrap(), payload);
}

#[test]
fn test_streamed_entry_on_seekable_sink_is_patched() {
    let payload = common::random_bytes(3000, 1);
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer.start_entry("patched.bin", &EntryOptions::default()).unwrap();
    writer.write_all(&payload).unwrap();
    writer.close_entry().unwrap();
    let (_, cursor) = writer.finish_into_inner().unwrap();
    let bytes = cursor.into_inner();

    let local = local_fields(&bytes, 0);
    assert_eq!(local.flags & DATA_DESCRIPTOR_FLAG, 0);
    assert_eq!(local.crc32, crc32fast::hash(&payload));
    assert_eq!(local.uncompressed, payload.len() as u32);
    assert_eq!(u32_at(&bytes, local.data_offset + local.compressed as usize), CDFH_SIGNATURE);
    common::verify_archive_contents(&bytes, &[("patched.bin", payload.as_slice())]);
}

#[test]
fn test_entry_protocol_errors() {
    let mut writer = Writer::new_streaming(Vec::new());
    assert!(matches!(writer.close_entry(), Err(Error::NoEntryInProgress)));

    writer.start_entry("first", &EntryOptions::default()).unwrap();
    assert!(writer.is_entry_open());
    let err = writer.start_entry("second", &EntryOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EntryInProgress { ref name } if name == "first"));
    let err = writer.add_bytes("third", b"x", &EntryOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EntryInProgress { .. }));
    writer.write_all(b"data").unwrap();
    writer.close_entry().unwrap();

    let err = writer.start_entry("first", &EntryOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EntryExists { .. }));

    // finish closes a still-open entry
    writer.start_entry("last", &EntryOptions::default()).unwrap();
    writer.write_all(b"tail").unwrap();
    let (result, bytes) = writer.finish_into_inner().unwrap();
    assert_eq!(result.entries_written, 2);
    common::verify_archive_contents(&bytes, &[("first", b"data".as_slice()), ("last", b"tail".as_slice())]);
}

#[test]
fn test_large_file_reserves_zip64_descriptor() {
    let mut writer = Writer::new_streaming(Vec::new());
    let opts = EntryOptions::new()
        .compression(CompressionMethod::Store)
        .large_file(true);
    writer.start_entry("maybe-huge.bin", &opts).unwrap();
    writer.write_all(b"small after all").unwrap();
    writer.close_entry().unwrap();
    let (_, bytes) = writer.finish_into_inner().unwrap();

    let local = local_fields(&bytes, 0);
    assert_eq!(local.compressed, 0);
    assert_eq!(local.uncompressed, 0);
    // A ZIP64 record in the local header announces 8-byte descriptor sizes.
    let extra = 30 + "maybe-huge.bin".len();
    assert_eq!(u16_at(&bytes, extra), 0x0001);
    let descriptor = local.data_offset + 15;
    assert_eq!(u32_at(&bytes, descriptor), DESCRIPTOR_SIGNATURE);
    assert_eq!(common::u64_at(&bytes, descriptor + 8), 15);
    assert_eq!(common::u64_at(&bytes, descriptor + 16), 15);
    assert_eq!(u32_at(&bytes, descriptor + 24), CDFH_SIGNATURE);
    common::verify_archive_contents(&bytes, &[("maybe-huge.bin", b"small after all".as_slice())]);
}
