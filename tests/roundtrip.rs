//! Round-trip integration tests.
//!
//! Every supported compression method is combined with every encryption
//! method, written both from memory and as a streamed entry, and read back.

mod common;

use std::io::Cursor;

use zipkit::{
    AesStrength, Archive, CompressionMethod, DosDateTime, EncryptionMethod, EntryOptions, Password,
    Writer,
};

fn compression_methods() -> Vec<CompressionMethod> {
    let mut methods = vec![CompressionMethod::Store];
    #[cfg(feature = "deflate")]
    methods.push(CompressionMethod::Deflate);
    #[cfg(feature = "bzip2")]
    methods.push(CompressionMethod::Bzip2);
    #[cfg(feature = "lzma")]
    methods.push(CompressionMethod::Lzma);
    #[cfg(feature = "zstd")]
    methods.push(CompressionMethod::Zstd);
    methods
}

fn encryption_methods() -> Vec<EncryptionMethod> {
    let mut methods = vec![EncryptionMethod::None, EncryptionMethod::ZipCrypto];
    #[cfg(feature = "aes")]
    methods.extend([
        EncryptionMethod::Aes(AesStrength::Aes128),
        EncryptionMethod::Aes(AesStrength::Aes256),
    ]);
    methods
}

fn options_for(compression: CompressionMethod, encryption: EncryptionMethod) -> EntryOptions {
    let opts = EntryOptions::new().compression(compression).encryption(encryption);
    if encryption.is_encrypted() {
        opts.password(Password::new("correct horse"))
    } else {
        opts
    }
}

#[test]
fn test_every_method_combination() {
    let text = common::text_bytes(40_000);
    let noise = common::random_bytes(20_000, 7);
    let entries: [(&str, &[u8]); 3] = [("text.txt", &text), ("noise.bin", &noise), ("empty", b"")];

    for compression in compression_methods() {
        for encryption in encryption_methods() {
            let opts = options_for(compression, encryption);
            for streamed in [false, true] {
                let bytes = if streamed {
                    common::create_streamed_archive(&opts, &entries)
                } else {
                    common::create_archive_with_result(None, &opts, &entries).map(|(b, _)| b)
                }
                .unwrap_or_else(|e| panic!("{compression:?}/{encryption:?}: {e}"));

                let mut archive = Archive::open(Cursor::new(bytes)).unwrap();
                archive.set_password(Password::new("correct horse"));
                for entry in archive.entries() {
                    assert_eq!(entry.compression(), Some(compression));
                    assert_eq!(entry.encryption, encryption);
                }
                common::verify_opened(&mut archive, &entries);
            }
        }
    }
}

#[test]
fn test_empty_archive() {
    let (bytes, result) =
        common::create_archive_with_result(None, &EntryOptions::default(), &[]).unwrap();
    assert_eq!(result.entries_written, 0);
    assert_eq!(result.directories_written, 0);
    assert_eq!(bytes.len(), 22);
    assert_eq!(common::u32_at(&bytes, 0), 0x0605_4b50);

    let archive = Archive::open(Cursor::new(bytes)).unwrap();
    assert!(archive.is_empty());
}

#[test]
fn test_unicode_names_set_utf8_flag() {
    let entries: [(&str, &[u8]); 3] = [
        ("日本語.txt", b"japanese"),
        ("ελληνικά/αρχείο.txt", b"greek"),
        ("emoji_🎉.txt", b"party"),
    ];
    let bytes = common::create_archive(&entries).unwrap();
    let archive = Archive::open(Cursor::new(&bytes)).unwrap();
    for entry in archive.entries() {
        assert_ne!(entry.flags & (1 << 11), 0, "{} lacks the UTF-8 flag", entry.name);
    }
    common::verify_archive_contents(&bytes, &entries);

    let ascii = common::create_archive(&[("plain.txt", b"x".as_slice())]).unwrap();
    let archive = Archive::open(Cursor::new(ascii)).unwrap();
    assert_eq!(archive.entries()[0].flags & (1 << 11), 0);
}

#[test]
fn test_directories_and_metadata() {
    let when = DosDateTime::new(2021, 6, 15, 12, 30, 44).unwrap();
    let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
    writer
        .add_directory("docs", &EntryOptions::new().last_modified(when))
        .unwrap();
    writer
        .add_bytes(
            "docs/run.sh",
            b"#!/bin/sh\n",
            &EntryOptions::new()
                .last_modified(when)
                .unix_permissions(0o755)
                .comment("launcher"),
        )
        .unwrap();
    let (result, cursor) = writer.finish_into_inner().unwrap();
    assert_eq!(result.entries_written, 1);
    assert_eq!(result.directories_written, 1);

    let archive = Archive::open(Cursor::new(cursor.into_inner())).unwrap();
    let dir = archive.entry("docs/").unwrap();
    assert!(dir.is_directory);
    assert_ne!(dir.external_attributes & 0x10, 0);
    assert_eq!(dir.uncompressed_size, 0);

    let script = archive.entry("docs/run.sh").unwrap();
    assert_eq!(script.unix_permissions(), Some(0o755));
    assert_eq!(script.comment, "launcher");
    assert_eq!(script.last_modified, when);
}

#[test]
fn test_reopen_is_idempotent() {
    let text = common::text_bytes(5000);
    let bytes = common::create_archive(&[("a", text.as_slice()), ("b", b"bee".as_slice())]).unwrap();

    let mut first = Archive::open(Cursor::new(&bytes)).unwrap();
    let mut second = Archive::open(Cursor::new(&bytes)).unwrap();
    assert_eq!(
        first.central_directory_bytes().unwrap(),
        second.central_directory_bytes().unwrap()
    );
    let names = |a: &Archive<Cursor<&Vec<u8>>>| {
        a.entries()
            .iter()
            .map(|e| (e.name.clone(), e.crc32, e.local_header_offset))
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&first), names(&second));
}

#[cfg(feature = "deflate")]
#[test]
fn test_compression_levels() {
    let text = common::text_bytes(100_000);
    for level in [0, 1, 6, 9] {
        let opts = EntryOptions::new()
            .compression(CompressionMethod::Deflate)
            .level(level)
            .unwrap();
        let (bytes, result) =
            common::create_archive_with_result(None, &opts, &[("t", text.as_slice())]).unwrap();
        assert!(result.compressed_size < result.total_size || level == 0);
        common::verify_archive_contents(&bytes, &[("t", text.as_slice())]);
    }
    assert!(EntryOptions::new().level(10).is_err());
}
