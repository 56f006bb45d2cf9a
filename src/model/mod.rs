//! In-memory archive model.
//!
//! A [`ZipModel`] is the ordered entry list plus the archive-level trailer
//! values. Reading builds one from the central directory; writing fills one
//! as entries close and serializes it at finish.

mod entry;

use std::collections::HashMap;

pub use entry::Entry;

use crate::{Error, Result};

/// One logical archive: entries in central directory order plus trailer
/// values.
///
/// Names are unique; [`push`](Self::push) rejects duplicates.
#[derive(Debug, Clone, Default)]
pub struct ZipModel {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    /// Archive comment bytes.
    pub comment: Vec<u8>,
    /// A ZIP64 trailer is present (read) or required (write).
    pub zip64: bool,
    /// Number of disks.
    pub total_disks: u32,
    /// Disk holding the start of the central directory.
    pub cd_start_disk: u32,
    /// Absolute offset of the central directory.
    pub cd_offset: u64,
    /// Central directory size, digital signature included.
    pub cd_size: u64,
    /// Digital signature payload found after the central directory.
    pub digital_signature: Option<Vec<u8>>,
}

impl ZipModel {
    /// Creates an empty model for a new single-disk archive.
    pub fn new() -> Self {
        Self {
            total_disks: 1,
            ..Self::default()
        }
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryExists`] if the name is taken.
    pub fn push(&mut self, entry: Entry) -> Result<()> {
        if self.index.contains_key(&entry.name) {
            return Err(Error::EntryExists { name: entry.name });
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Removes an entry by name, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        let position = self.index.remove(name)?;
        let entry = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(entry)
    }

    /// Looks up an entry by name.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Returns true if an entry with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entries in order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Mutable access for rewriting offsets; names must not change.
    pub(crate) fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a ZipModel {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::central::CentralDirectoryHeader;
    use crate::format::extra::ExtraField;
    use crate::timestamp::DosDateTime;

    fn entry(name: &str) -> Entry {
        let header = CentralDirectoryHeader {
            version_made_by: 0,
            version_needed: 20,
            flags: 0,
            compression_method: 0,
            last_modified: DosDateTime::default(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_number: 0,
            internal_attributes: 0,
            external_attributes: 0,
            local_header_offset: 0,
            name: name.as_bytes().to_vec(),
            extra: ExtraField::new(),
            comment: Vec::new(),
        };
        Entry::from_central(header, 0).unwrap()
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut model = ZipModel::new();
        model.push(entry("a")).unwrap();
        let err = model.push(entry("a")).unwrap_err();
        assert!(matches!(err, Error::EntryExists { ref name } if name == "a"));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut model = ZipModel::new();
        for name in ["a", "b", "c", "d"] {
            model.push(entry(name)).unwrap();
        }
        assert!(model.remove("b").is_some());
        assert!(model.remove("b").is_none());
        let names: Vec<_> = model.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "c", "d"]);
        assert_eq!(model.get("d").unwrap().name, "d");
        assert_eq!(model.get("c").unwrap().name, "c");
        model.push(entry("b")).unwrap();
        assert_eq!(model.entries().last().unwrap().name, "b");
    }
}
