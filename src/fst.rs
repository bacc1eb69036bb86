//! File system table (FST) decoding
//!
//! The FST sits in a partition's logical data area at the offset stored at
//! 0x424 (size at 0x428, both in word units). It is a flat array of
//! 12-byte entries followed by a table of NUL-terminated names:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ byte 0      : 1 = directory, 0 = file                        │
//! │ bytes 1..4  : name offset into the name table (24 bits)      │
//! │ bytes 4..8  : file: data offset (x4) | dir: parent index     │
//! │ bytes 8..12 : file: length in bytes  | dir: next index       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entry 0 is the root directory; its "next index" is the entry count.

use tracing::{debug, instrument};

use crate::common::{be_at, ByteWidth, OFFSET_SHIFT};
use crate::error::{ScrubError, ScrubResult};
use crate::scrub::types::{FST_OFFSET_FIELD, FST_SIZE_FIELD};
use crate::volume::Volume;

const FST_ENTRY_SIZE: usize = 12;
const DIRECTORY_FLAG: u32 = 0x0100_0000;
const NAME_OFFSET_MASK: u32 = 0x00FF_FFFF;
/// Largest FST read into memory; real tables are a few hundred KiB
pub const MAX_FST_SIZE: u64 = 0x200_0000;

/// A file or directory from a partition's file system
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    /// Logical offset within the partition's data area
    pub offset: u64,
    /// Length in bytes (for directories, the raw "next index" field)
    pub size: u64,
    pub is_dir: bool,
}

impl FileEntry {
    /// Length to mark as live: directories reserve a single byte
    pub fn marked_length(&self) -> u64 {
        if self.is_dir {
            1
        } else {
            self.size
        }
    }
}

/// Lists the entries of a partition's file system
pub trait FileSystemWalker {
    fn list(&self, view: &mut dyn Volume) -> ScrubResult<Vec<FileEntry>>;
}

/// Walker for the FST layout
#[derive(Clone, Copy, Debug, Default)]
pub struct FstWalker;

impl FileSystemWalker for FstWalker {
    #[instrument(skip_all)]
    fn list(&self, view: &mut dyn Volume) -> ScrubResult<Vec<FileEntry>> {
        let fst_offset = view.read_shifted(FST_OFFSET_FIELD)?;
        let fst_size = view.read_shifted(FST_SIZE_FIELD)?;

        if fst_size > MAX_FST_SIZE {
            return Err(ScrubError::Filesystem(format!(
                "FST size 0x{:x} exceeds the 0x{:x} byte limit",
                fst_size, MAX_FST_SIZE
            )));
        }
        let end = fst_offset.saturating_add(fst_size);
        if fst_size < FST_ENTRY_SIZE as u64 || end > view.size() {
            return Err(ScrubError::Filesystem(format!(
                "FST at 0x{:x} (0x{:x} bytes) does not fit the partition (0x{:x} bytes)",
                fst_offset,
                fst_size,
                view.size()
            )));
        }

        let mut table = vec![0u8; fst_size as usize];
        view.read_at(fst_offset, &mut table)?;
        let entries = parse_fst(&table)?;
        debug!(fst_offset, fst_size, entry_count = entries.len(), "Walked FST");
        Ok(entries)
    }
}

/// Decode a complete FST held in memory
pub fn parse_fst(table: &[u8]) -> ScrubResult<Vec<FileEntry>> {
    let word = |at: usize| be_at(table, at, ByteWidth::U32).map(|v| v as u32);
    let count = word(8).ok_or_else(|| ScrubError::Filesystem("FST is empty".to_string()))? as usize;

    let names_start = count
        .checked_mul(FST_ENTRY_SIZE)
        .filter(|&len| count > 0 && len <= table.len())
        .ok_or_else(|| {
            ScrubError::Filesystem(format!(
                "FST entry count {} does not fit {} bytes",
                count,
                table.len()
            ))
        })?;
    let names = &table[names_start..];

    let mut entries = Vec::with_capacity(count);
    // (end index, path) of the directories enclosing the current entry
    let mut parents: Vec<(usize, String)> = Vec::new();

    for i in 0..count {
        let at = i * FST_ENTRY_SIZE;
        let (head, field, size) = match (word(at), word(at + 4), word(at + 8)) {
            (Some(h), Some(f), Some(s)) => (h, f, s),
            _ => return Err(ScrubError::Filesystem(format!("FST entry {} truncated", i))),
        };
        let is_dir = head & DIRECTORY_FLAG != 0;

        while parents.last().map_or(false, |(end, _)| *end <= i) {
            parents.pop();
        }

        let path = if i == 0 {
            "/".to_string()
        } else {
            let parent = parents.last().map(|(_, p)| p.as_str()).unwrap_or("");
            format!("{}/{}", parent, entry_name(names, head & NAME_OFFSET_MASK, i))
        };
        debug!(path = path.as_str(), is_dir, "FST entry");

        if is_dir && i > 0 {
            parents.push((size as usize, path.clone()));
        }

        entries.push(FileEntry {
            path,
            offset: u64::from(field) << OFFSET_SHIFT,
            size: u64::from(size),
            is_dir,
        });
    }

    Ok(entries)
}

fn entry_name(names: &[u8], offset: u32, index: usize) -> String {
    match names.get(offset as usize..) {
        Some(rest) => {
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            String::from_utf8_lossy(&rest[..end]).to_string()
        }
        None => format!("#{}", index),
    }
}

/// Build an FST from `(name, is_dir, offset, size)` tuples (root excluded)
///
/// For directories `offset` is the parent index and `size` the next index.
#[cfg(test)]
pub(crate) fn build_fst(entries: &[(&str, bool, u64, u32)]) -> Vec<u8> {
    let count = entries.len() + 1;
    let mut table = vec![0u8; count * FST_ENTRY_SIZE];
    let mut names = Vec::new();

    table[0] = 1;
    table[8..12].copy_from_slice(&(count as u32).to_be_bytes());
    for (i, &(name, is_dir, offset, size)) in entries.iter().enumerate() {
        let at = (i + 1) * FST_ENTRY_SIZE;
        let head = (names.len() as u32) | if is_dir { DIRECTORY_FLAG } else { 0 };
        let field = if is_dir { offset as u32 } else { (offset >> OFFSET_SHIFT) as u32 };
        table[at..at + 4].copy_from_slice(&head.to_be_bytes());
        table[at + 4..at + 8].copy_from_slice(&field.to_be_bytes());
        table[at + 8..at + 12].copy_from_slice(&size.to_be_bytes());
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }
    table.extend_from_slice(&names);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::MemVolume;

    #[test]
    fn test_parse_nested_tree() {
        let table = build_fst(&[
            ("boot.bin", false, 0x10000, 0x440),
            ("files", true, 0, 6),
            ("a.arc", false, 0x20000, 0x1234),
            ("sub", true, 2, 6),
            ("b.bin", false, 0x30000, 64),
            ("tail.bin", false, 0x40000, 8),
        ]);
        let entries = parse_fst(&table).unwrap();

        assert_eq!(entries.len(), 7);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].path, "/");
        assert_eq!(entries[1].path, "/boot.bin");
        assert_eq!(entries[1].offset, 0x10000);
        assert_eq!(entries[1].size, 0x440);
        assert_eq!(entries[3].path, "/files/a.arc");
        assert_eq!(entries[5].path, "/files/sub/b.bin");
        assert_eq!(entries[6].path, "/tail.bin");
        assert_eq!(entries[6].marked_length(), 8);
        assert_eq!(entries[4].marked_length(), 1);
    }

    #[test]
    fn test_reject_bad_entry_count() {
        let mut table = build_fst(&[("a", false, 0, 1)]);
        table[8..12].copy_from_slice(&1000u32.to_be_bytes());
        assert!(matches!(parse_fst(&table), Err(ScrubError::Filesystem(_))));

        table[8..12].copy_from_slice(&0u32.to_be_bytes());
        assert!(parse_fst(&table).is_err());
    }

    #[test]
    fn test_walk_through_view() {
        let fst = build_fst(&[("a.bin", false, 0x8000, 100)]);
        let mut data = vec![0u8; 0x1000];
        data[0x424..0x428].copy_from_slice(&(0x800u32 >> 2).to_be_bytes());
        data[0x428..0x42c].copy_from_slice(&((fst.len() as u32 + 3) >> 2).to_be_bytes());
        data[0x800..0x800 + fst.len()].copy_from_slice(&fst);

        let mut view = MemVolume::new(data);
        let entries = FstWalker.list(&mut view).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].path, "/a.bin");
        assert_eq!(entries[1].offset, 0x8000);
    }

    #[test]
    fn test_walk_rejects_fst_outside_view() {
        let mut data = vec![0u8; 0x1000];
        data[0x424..0x428].copy_from_slice(&(0x10000u32 >> 2).to_be_bytes());
        data[0x428..0x42c].copy_from_slice(&(0x40u32 >> 2).to_be_bytes());
        let mut view = MemVolume::new(data);
        assert!(FstWalker.list(&mut view).is_err());
    }

    #[test]
    fn test_walk_rejects_oversized_fst() {
        let mut data = vec![0u8; 0x1000];
        data[0x424..0x428].copy_from_slice(&(0x800u32 >> 2).to_be_bytes());
        data[0x428..0x42c].copy_from_slice(&0xFFFF_FFF0u32.to_be_bytes());
        let mut view = MemVolume::new(data);
        let err = FstWalker.list(&mut view).unwrap_err();
        assert!(matches!(err, ScrubError::Filesystem(ref message) if message.contains("limit")));
    }
}
