//! Physical storage: single files, streams and split archives.
//!
//! An archive is one logical byte sequence stored on one or more disks. The
//! reading side maps that sequence onto files through a [`DiskTable`]; the
//! writing side hands the archive writer a [`VolumeWriter`] that reports
//! positions in the form headers need them.
//!
//! # Split naming
//!
//! Two conventions are supported:
//!
//! - [`SplitNaming::Pkware`]: `backup.z01`, `backup.z02`, ..., `backup.zip`.
//!   The final part always carries the `.zip` name. Headers record real
//!   disk numbers and offsets relative to their disk.
//! - [`SplitNaming::Numbered`]: `backup.zip.001`, `backup.zip.002`, ...
//!   Concatenating the parts gives an ordinary archive; headers use disk 0
//!   and absolute offsets.
//!
//! # Writing a split archive
//!
//! ```rust,no_run
//! use zipkit::volume::{SplitConfig, SplitNaming};
//! use zipkit::{EntryOptions, Writer};
//!
//! let config = SplitConfig::new(64 * 1024 * 1024)?.naming(SplitNaming::Numbered);
//! let mut writer = Writer::create_split("backup.zip", config)?;
//! writer.add_bytes("data.bin", &[0u8; 1024], &EntryOptions::default())?;
//! writer.finish()?;
//! # Ok::<(), zipkit::Error>(())
//! ```

mod config;
mod disk;
mod reader;
mod sink;
mod unified;
mod writer;

pub use config::{
    MIN_SPLIT_SIZE, SplitConfig, SplitNaming, numbered_part_path, part_path, pkware_part_path,
};
pub use disk::{Disk, DiskTable};
pub use reader::{SplitReader, discover};
pub use sink::{FileVolume, SeekableVolume, StreamingVolume};
pub use unified::UnifiedReader;
pub use writer::{SplitWriter, VolumeWriter};
