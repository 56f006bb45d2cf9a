//! Fuzz target for Archive::open with arbitrary byte input.
//!
//! Exercises the trailer scan, ZIP64 resolution and central directory
//! parsing with malformed or adversarial input.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(archive) = zipkit::Archive::open(Cursor::new(data)) {
        for entry in archive.entries() {
            let _ = entry.name.as_str();
            let _ = entry.compression();
            let _ = entry.uncompressed_size;
            let _ = entry.local_header_offset;
        }
        let _ = archive.comment();
    }
});
