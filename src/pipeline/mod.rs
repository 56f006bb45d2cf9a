//! The entry codec pipeline.
//!
//! One entry's bytes pass through a fixed stack of stages:
//!
//! ```text
//! write:  caller -> CRC -> compress -> encrypt -> sink
//! read:   source -> decrypt -> decompress -> CRC check -> caller
//! ```
//!
//! Each stage owns the next one and hands it back from `finish`, so the
//! writer recovers its sink intact once an entry is closed. The CRC is
//! always computed over plaintext.

pub mod decoder;
pub mod encoder;

pub use decoder::{DecodeParams, EntryDecoder, decode_to_vec};
pub use encoder::{EncodedEntry, Encryption, EntryEncoder, SetupError};
