//! Fixed-size page representation for the linear-hash store.
//!
//! This module defines the [`Page`] struct, which models a single 4096-byte page of the
//! backing file. Each page holds a slot directory and a densely packed array of fixed-size
//! `(key, value)` records, plus a `next` pointer chaining it to the following overflow page
//! in its bucket (or `0` if it is the last page in the chain).
//!
//! # Layout
//!
//! ```text
//! byte 0..8        next page id (little-endian u64), 0 = none
//! byte 8..240      slot directory, one byte per slot: 0 = free, 1 = occupied
//! byte 240..4096   densely packed (key, value) records, one per slot
//! ```
//!
//! Pages are the unit of I/O and caching; they are read and written whole by
//! [`store`](crate::storage::store) through [`buffer`](crate::storage::buffer).
//!
//! # See Also
//! - [`buffer`](crate::storage::buffer): caches resident pages and evicts them under pressure.
//! - [`store`](crate::storage::store): drives page allocation and chain traversal.

use log::trace;

/// Page identifier; `0` is the sentinel meaning "no page".
pub type PageId = u64;

/// Standard page size, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Size, in bytes, of the `next` page pointer at the head of every page.
pub const NEXT_SIZE: usize = 8;

/// Offset at which the slot directory ends and record contents begin.
pub const HEADER_END: usize = 240;

/// Size, in bytes, of the slot directory; bounds every page to at most this many slots.
pub const DIRECTORY_SIZE: usize = HEADER_END - NEXT_SIZE;

/// Size, in bytes, of the record contents region.
pub const CONTENTS_SIZE: usize = PAGE_SIZE - HEADER_END;

/// In-memory representation of one on-disk page.
///
/// Cached fields (`dirty`, `last_accessed`, the decoded `next`) are kept alongside, not
/// interleaved with, the raw directory/contents bytes.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: PageId,
    next: PageId,
    directory: [u8; DIRECTORY_SIZE],
    contents: Vec<u8>,
    key_size: u16,
    value_size: u16,
    pub dirty: bool,
    pub last_accessed: u64,
}

impl Page {
    /// Creates a fresh, zeroed page for the given id.
    pub fn new(id: PageId, key_size: u16, value_size: u16) -> Self {
        Self {
            id,
            next: 0,
            directory: [0; DIRECTORY_SIZE],
            contents: vec![0; CONTENTS_SIZE],
            key_size,
            value_size,
            dirty: false,
            last_accessed: 0,
        }
    }

    /// Reconstructs a page from its on-disk byte representation.
    pub fn from_bytes(id: PageId, key_size: u16, value_size: u16, bytes: &[u8; PAGE_SIZE]) -> Self {
        let next = u64::from_le_bytes(bytes[0..NEXT_SIZE].try_into().expect("fixed size slice"));
        let mut directory = [0u8; DIRECTORY_SIZE];
        directory.copy_from_slice(&bytes[NEXT_SIZE..HEADER_END]);
        let contents = bytes[HEADER_END..PAGE_SIZE].to_vec();

        Self {
            id,
            next,
            directory,
            contents,
            key_size,
            value_size,
            dirty: false,
            last_accessed: 0,
        }
    }

    /// Serializes the page to its on-disk byte representation.
    pub fn to_bytes(&self) -> [u8; PAGE_SIZE] {
        let mut buf = [0u8; PAGE_SIZE];
        buf[0..NEXT_SIZE].copy_from_slice(&self.next.to_le_bytes());
        buf[NEXT_SIZE..HEADER_END].copy_from_slice(&self.directory);
        buf[HEADER_END..PAGE_SIZE].copy_from_slice(&self.contents);
        buf
    }

    /// The id of the next overflow page in this bucket's chain, or `0` if this page is
    /// terminal.
    pub fn next(&self) -> PageId {
        self.next
    }

    /// Sets the next-page pointer and marks the page dirty.
    pub fn set_next(&mut self, next: PageId) {
        self.next = next;
        self.dirty = true;
    }

    /// The maximum number of records this page can hold, bounded by both the slot
    /// directory size and how many `(key, value)` tuples fit in the contents region.
    pub fn max_slots(&self) -> usize {
        let tuple_size = self.tuple_size();
        DIRECTORY_SIZE.min(CONTENTS_SIZE / tuple_size)
    }

    fn tuple_size(&self) -> usize {
        self.key_size as usize + self.value_size as usize
    }

    fn slot_offset(&self, slot: usize) -> usize {
        slot * self.tuple_size()
    }

    /// Scans slots in order, comparing the first `key_size` bytes of each against `key`.
    /// Ignores the slot directory entirely; [`Self::delete_record`] zeroes record bytes so
    /// a freed slot can never look like a match.
    fn find(&self, key: &[u8]) -> Option<usize> {
        for slot in 0..self.max_slots() {
            let offset = self.slot_offset(slot);
            if &self.contents[offset..offset + self.key_size as usize] == key {
                trace!("page {}: found key at slot {slot}", self.id);
                return Some(offset);
            }
        }
        None
    }

    fn first_free_slot(&self) -> Option<usize> {
        (0..self.max_slots()).find(|&slot| self.directory[slot] == 0)
    }

    /// Reads the value for `key`, or `None` if absent.
    pub fn read_record(&self, key: &[u8]) -> Option<Vec<u8>> {
        let offset = self.find(key)?;
        let value_start = offset + self.key_size as usize;
        Some(self.contents[value_start..value_start + self.value_size as usize].to_vec())
    }

    /// Writes `(key, value)` into the page.
    ///
    /// If `skip_find` is `false`, an existing record with the same key is overwritten in
    /// place. Otherwise (or on miss) the lowest-indexed free slot is used. `skip_find` is
    /// used during bucket splits, where the caller already knows the key is not present.
    ///
    /// Returns `(added, full)`: `added` is `true` when a new slot was consumed; `full` is
    /// `true` when no free slot was available and the page was left unmodified.
    pub fn write_record(&mut self, key: &[u8], value: &[u8], skip_find: bool) -> (bool, bool) {
        let found = if skip_find { None } else { self.find(key) };

        let (offset, added) = match found {
            Some(offset) => (offset, false),
            None => match self.first_free_slot() {
                Some(slot) => (self.slot_offset(slot), true),
                None => return (false, true),
            },
        };

        if added {
            self.directory[offset / self.tuple_size()] = 1;
        }

        let value_start = offset + self.key_size as usize;
        self.contents[offset..value_start].copy_from_slice(key);
        self.contents[value_start..value_start + self.value_size as usize].copy_from_slice(value);
        self.dirty = true;

        (added, false)
    }

    /// Deletes the record matching `key`, zeroing both its directory entry and payload so
    /// a stale match can never be returned by [`Self::read_record`]. Returns whether a
    /// record was found.
    pub fn delete_record(&mut self, key: &[u8]) -> bool {
        let Some(offset) = self.find(key) else {
            return false;
        };
        let tuple_size = self.tuple_size();
        self.directory[offset / tuple_size] = 0;
        self.contents[offset..offset + tuple_size].fill(0);
        self.dirty = true;
        true
    }

    /// Returns every `(key, value)` pair whose directory entry is occupied.
    pub fn read_all_records(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut records = Vec::new();
        for slot in 0..self.max_slots() {
            if self.directory[slot] != 1 {
                continue;
            }
            let offset = self.slot_offset(slot);
            let value_start = offset + self.key_size as usize;
            let key = self.contents[offset..value_start].to_vec();
            let value = self.contents[value_start..value_start + self.value_size as usize].to_vec();
            records.push((key, value));
        }
        records
    }

    /// Zeroes the entire slot directory. Record bytes are left untouched; a later
    /// `write_record` with `skip_find = true` overwrites them.
    pub fn delete_all_records(&mut self) {
        self.directory = [0; DIRECTORY_SIZE];
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Page {
        Page::new(1, 8, 8)
    }

    fn pad(bytes: &[u8], size: usize) -> Vec<u8> {
        let mut padded = bytes.to_vec();
        padded.resize(size, 0);
        padded
    }

    #[test]
    fn write_then_read() {
        let mut p = page();
        let key = pad(b"hello", 8);
        let value = pad(b"world", 8);
        let (added, full) = p.write_record(&key, &value, false);
        assert!(added);
        assert!(!full);
        assert_eq!(p.read_record(&key), Some(value));
    }

    #[test]
    fn write_overwrites_existing_key() {
        let mut p = page();
        let key = pad(b"key", 8);
        p.write_record(&key, &pad(b"first", 8), false);
        let (added, full) = p.write_record(&key, &pad(b"second", 8), false);
        assert!(!added);
        assert!(!full);
        assert_eq!(p.read_record(&key), Some(pad(b"second", 8)));
    }

    #[test]
    fn read_missing_key_returns_none() {
        let p = page();
        assert_eq!(p.read_record(&pad(b"nope", 8)), None);
    }

    #[test]
    fn write_reports_full_without_mutating() {
        let mut p = page();
        let max = p.max_slots();
        for i in 0..max {
            let key = (i as u64).to_le_bytes().to_vec();
            p.write_record(&key, &pad(b"v", 8), true);
        }
        let before = p.read_all_records().len();
        let (added, full) = p.write_record(&pad(b"overflow", 8), &pad(b"v", 8), true);
        assert!(!added);
        assert!(full);
        assert_eq!(p.read_all_records().len(), before);
    }

    #[test]
    fn delete_zeroes_slot_so_stale_reads_miss() {
        let mut p = page();
        let key = pad(b"key", 8);
        p.write_record(&key, &pad(b"value", 8), false);
        assert!(p.delete_record(&key));
        assert_eq!(p.read_record(&key), None);
        assert!(!p.delete_record(&key));
    }

    #[test]
    fn read_all_records_only_returns_occupied_slots() {
        let mut p = page();
        p.write_record(&pad(b"a", 8), &pad(b"1", 8), false);
        p.write_record(&pad(b"b", 8), &pad(b"2", 8), false);
        p.delete_record(&pad(b"a", 8));
        let all = p.read_all_records();
        assert_eq!(all, vec![(pad(b"b", 8), pad(b"2", 8))]);
    }

    #[test]
    fn delete_all_records_clears_directory_but_not_bytes() {
        let mut p = page();
        p.write_record(&pad(b"a", 8), &pad(b"1", 8), false);
        p.delete_all_records();
        assert_eq!(p.read_all_records(), vec![]);
        // skip_find writes reuse the now-unoccupied slot 0 without needing a scan.
        p.write_record(&pad(b"c", 8), &pad(b"3", 8), true);
        assert_eq!(p.read_record(&pad(b"c", 8)), Some(pad(b"3", 8)));
    }

    #[test]
    fn round_trip_through_bytes() {
        let mut p = page();
        p.write_record(&pad(b"a", 8), &pad(b"1", 8), false);
        p.set_next(7);
        let bytes = p.to_bytes();
        let reloaded = Page::from_bytes(p.id, 8, 8, &bytes);
        assert_eq!(reloaded.next(), 7);
        assert_eq!(reloaded.read_record(&pad(b"a", 8)), Some(pad(b"1", 8)));
    }

    #[test]
    fn max_slots_is_bounded_by_directory_size() {
        // key_size + value_size = 1 would make floor(3856/1) = 3856 slots, far more than
        // the 232-byte directory can track.
        let p = Page::new(1, 0, 1);
        assert_eq!(p.max_slots(), DIRECTORY_SIZE);
    }
}
