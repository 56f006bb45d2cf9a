//! Fuzz target for entry decoding.
//!
//! Opens arbitrary bytes and extracts every entry with a fixed password,
//! reaching the local header codec, decryption and decompression.
//!
//! Run with: cargo +nightly fuzz run entry_extract

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use zipkit::{Archive, Password};

fuzz_target!(|data: &[u8]| {
    let Ok(mut archive) = Archive::open(Cursor::new(data)) else {
        return;
    };
    archive.set_password(Password::new("fuzz"));
    let names: Vec<String> = archive.entries().iter().map(|e| e.name.clone()).collect();
    for name in names {
        let mut sink = std::io::sink();
        let _ = archive.extract_to(&name, &mut sink);
    }
});
