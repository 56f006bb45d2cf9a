//! Archive query methods.

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::model::{Entry, ZipModel};
use crate::volume::Disk;
use crate::Result;

use super::Archive;

impl<R> Archive<R> {
    /// Entries in central directory order.
    pub fn entries(&self) -> &[Entry] {
        self.model.entries()
    }

    /// Looks up an entry by its exact stored name.
    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.model.get(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.model.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    /// The archive comment as stored. ZIP does not record its encoding.
    pub fn comment(&self) -> &[u8] {
        &self.model.comment
    }

    /// Returns true if the archive was read from more than one file.
    pub fn is_split(&self) -> bool {
        self.naming.is_some()
    }

    /// Returns true if the archive has a ZIP64 trailer.
    pub fn is_zip64(&self) -> bool {
        self.model.zip64
    }

    /// Paths of the physical files, in disk order. Empty when the archive
    /// was opened from a reader.
    pub fn volume_paths(&self) -> Vec<PathBuf> {
        self.table.paths()
    }

    /// The disk table.
    pub fn disks(&self) -> &[Disk] {
        self.table.disks()
    }

    /// The parsed archive model.
    pub fn model(&self) -> &ZipModel {
        &self.model
    }

    /// Consumes the archive, returning its model.
    pub fn into_model(self) -> ZipModel {
        self.model
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Reads the raw central directory, digital signature record included.
    pub fn central_directory_bytes(&mut self) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(self.model.cd_offset))?;
        let mut buf = Vec::with_capacity(self.model.cd_size.min(1 << 24) as usize);
        (&mut self.reader)
            .take(self.model.cd_size)
            .read_to_end(&mut buf)?;
        if (buf.len() as u64) < self.model.cd_size {
            return Err(crate::Error::corrupt_header(
                self.model.cd_offset,
                "central directory truncated",
            ));
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::CENTRAL_DIRECTORY_SIGNATURE;
    use crate::write::{EntryOptions, Writer};
    use std::io::Cursor;

    #[test]
    fn test_central_directory_bytes() {
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        writer.add_bytes("one", b"1", &EntryOptions::default()).unwrap();
        writer.add_bytes("two", b"2", &EntryOptions::default()).unwrap();
        let (_, cursor) = writer.finish_into_inner().unwrap();

        let mut archive = Archive::open(Cursor::new(cursor.into_inner())).unwrap();
        let cd = archive.central_directory_bytes().unwrap();
        assert_eq!(cd.len() as u64, archive.model().cd_size);
        assert_eq!(&cd[..4], &CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        assert!(archive.volume_paths().is_empty());
        assert!(archive.disks().is_empty());
    }
}
