//! Linear-hashing index driving the on-disk key-value store.
//!
//! The `store` module defines [`Store`], which ties together the page format and the
//! buffer pool into the public `Open`/`Put`/`Get`/`Delete`/`Close` contract. It owns the
//! backing file, the meta page, and the `bucket_to_page` mapping, and is responsible for
//! bucket lookup, chain traversal, and incremental growth (bucket splitting).
//!
//! # Responsibilities
//!
//! - Translating a key to a bucket via 64-bit FNV-1a hashing and linear-hash masking.
//! - Walking a bucket's overflow chain to satisfy Get/Put/Delete.
//! - Splitting one bucket at a time as the table fills, rather than rehashing everything at
//!   once.
//! - Persisting and restoring the meta page across Open/Close.
//!
//! # Example
//! ```no_run
//! use linhash_kv::Store;
//!
//! let mut store = Store::open(2, 16, 0.8, "example.db".into()).unwrap();
//! store.put(b"key", b"value").unwrap();
//! assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));
//! store.close().unwrap();
//! ```
//!
//! # Design Notes
//!
//! - The bucket-split target is computed with `buckets mod (1 << (split_pointer - 1))`
//!   rather than the canonical `buckets - 2^(split_pointer-1))`. The two formulas agree
//!   while `buckets < 2^split_pointer`; see `DESIGN.md` for the discrepancy once the table
//!   outgrows that bound.
//! - Dirty pages are flushed to disk after every mutating call rather than deferred to
//!   `close`, trading some write amplification for simpler failure semantics.
//!
//! # See Also
//! - [`page`](crate::storage::page): the page format walked by chain traversal.
//! - [`buffer`](crate::storage::buffer): the cache mediating every page access.
//! - [`meta`](crate::storage::meta): the encoding persisted at file offset 0.

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::{debug, error, trace};

use super::Error;
use super::buffer::BufferPool;
use super::meta::Meta;
use super::page::{PAGE_SIZE, Page, PageId};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// The linear-hashing key-value store.
///
/// Not `Sync`: a `Store` is meant to be driven from a single thread, matching the
/// synchronous, single-owner file access model described for this layer.
#[derive(Debug)]
pub struct Store {
    reader: BufReader<std::fs::File>,
    writer: BufWriter<std::fs::File>,
    pool: BufferPool,
    meta: Meta,
    split_threshold: f64,
    max_records_per_bucket: usize,
}

impl Store {
    /// Opens (creating if necessary) a store backed by the file at `path`.
    ///
    /// `initial_buckets` and `split_threshold` are only consulted when the file does not
    /// already exist; an existing file's meta page is authoritative. `buffer_capacity`
    /// bounds how many pages may be resident in the buffer pool at once.
    pub fn open(
        initial_buckets: u64,
        buffer_capacity: usize,
        split_threshold: f64,
        path: PathBuf,
    ) -> Result<Self, Error> {
        let existed = path.exists() && std::fs::metadata(&path)?.len() > 0;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        let reader = BufReader::new(file.try_clone()?);
        let writer = BufWriter::new(file);

        let mut store = Self {
            reader,
            writer,
            pool: BufferPool::new(buffer_capacity),
            meta: Meta::new(8, 8),
            split_threshold,
            max_records_per_bucket: 0,
        };

        if existed {
            store.read_meta()?;
        } else {
            store.initialize(initial_buckets.max(1))?;
        }
        store.max_records_per_bucket = Page::new(0, store.meta.key_size, store.meta.value_size).max_slots();

        Ok(store)
    }

    fn initialize(&mut self, initial_buckets: u64) -> Result<(), Error> {
        self.meta = Meta::new(8, 8);
        self.meta.buckets = initial_buckets;
        self.meta.split_pointer = 1;
        self.meta.pages = initial_buckets;
        self.meta.bucket_to_page = (1..=initial_buckets).collect();

        self.ensure_capacity(self.meta.pages)?;
        self.write_meta()
    }

    fn pad_key(&self, key: &[u8]) -> Vec<u8> {
        let mut padded = key.to_vec();
        padded.resize(self.meta.key_size as usize, 0);
        padded
    }

    fn pad_value(&self, value: &[u8]) -> Vec<u8> {
        let mut padded = value.to_vec();
        padded.resize(self.meta.value_size as usize, 0);
        padded
    }

    fn bucket_of(&self, padded_key: &[u8]) -> u64 {
        let hash = fnv1a_64(padded_key);
        let mask = (1u64 << self.meta.split_pointer) - 1;
        let mut bucket = hash & mask;
        if bucket >= self.meta.buckets {
            bucket ^= 1u64 << (self.meta.split_pointer - 1);
        }
        bucket
    }

    /// Reads the value for `key`, or `None` if it is not present.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        if key.len() > self.meta.key_size as usize {
            return Err(Error::KeyTooLarge);
        }
        let padded = self.pad_key(key);
        let bucket = self.bucket_of(&padded);
        let mut current = self.meta.bucket_to_page[bucket as usize];

        loop {
            let page = self.page_mut(current)?;
            if let Some(value) = page.read_record(&padded) {
                return Ok(Some(value));
            }
            let next = page.next();
            if next == 0 {
                return Ok(None);
            }
            current = next;
        }
    }

    /// Inserts or overwrites the value for `key`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        if key.len() > self.meta.key_size as usize {
            return Err(Error::KeyTooLarge);
        }
        if value.len() > self.meta.value_size as usize {
            return Err(Error::ValueTooLarge);
        }

        let padded_key = self.pad_key(key);
        let padded_value = self.pad_value(value);
        let bucket = self.bucket_of(&padded_key);
        let root = self.meta.bucket_to_page[bucket as usize];

        let added = self.insert_into_chain(root, &padded_key, &padded_value, false)?;
        if added {
            self.meta.record_count += 1;
            let threshold =
                self.split_threshold * self.meta.buckets as f64 * self.max_records_per_bucket as f64;
            if self.meta.record_count as f64 > threshold {
                debug!(
                    "record_count {} exceeds threshold {threshold}, growing",
                    self.meta.record_count
                );
                self.grow()?;
            }
        }

        self.flush_dirty()
    }

    /// Deletes the record for `key`, returning whether one was found.
    ///
    /// Uses the padded key consistently for bucket selection; hashing the unpadded key
    /// here would pick the wrong bucket whenever the key is shorter than `key_size`.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool, Error> {
        if key.len() > self.meta.key_size as usize {
            return Err(Error::KeyTooLarge);
        }
        let padded = self.pad_key(key);
        let bucket = self.bucket_of(&padded);
        let mut current = self.meta.bucket_to_page[bucket as usize];

        let found = loop {
            let page = self.page_mut(current)?;
            if page.delete_record(&padded) {
                break true;
            }
            let next = page.next();
            if next == 0 {
                break false;
            }
            current = next;
        };

        if found {
            self.meta.record_count -= 1;
            self.flush_dirty()?;
        }

        Ok(found)
    }

    /// Flushes all dirty pages and the meta page, then closes the underlying file.
    pub fn close(mut self) -> Result<(), Error> {
        self.flush_dirty()?;
        self.write_meta()
    }

    /// Walks the chain rooted at `root`, writing `(key, value)` into the first page with
    /// room, allocating a new overflow page if every page in the chain is full.
    fn insert_into_chain(
        &mut self,
        root: PageId,
        key: &[u8],
        value: &[u8],
        skip_find: bool,
    ) -> Result<bool, Error> {
        let mut current = root;
        loop {
            let page = self.page_mut(current)?;
            let (added, full) = page.write_record(key, value, skip_find);
            if !full {
                return Ok(added);
            }

            let next = page.next();
            if next != 0 {
                current = next;
                continue;
            }

            let new_id = self.allocate_page()?;
            let page = self.page_mut(current)?;
            page.set_next(new_id);
            current = new_id;
        }
    }

    /// Splits one bucket, redistributing its records between the old and a freshly
    /// allocated bucket.
    fn grow(&mut self) -> Result<(), Error> {
        let bucket_to_split = self.meta.buckets % (1u64 << (self.meta.split_pointer - 1));
        let root_id = self.meta.bucket_to_page[bucket_to_split as usize];
        debug!("growing: splitting bucket {bucket_to_split} (root page {root_id})");

        self.meta.buckets += 1;
        let new_bucket = self.meta.buckets - 1;
        let new_root_id = self.allocate_page()?;
        if (new_bucket as usize) < self.meta.bucket_to_page.len() {
            self.meta.bucket_to_page[new_bucket as usize] = new_root_id;
        } else {
            self.meta.bucket_to_page.push(new_root_id);
        }

        if self.meta.buckets > (1u64 << self.meta.split_pointer) {
            self.meta.split_pointer += 1;
        }

        let mut records = Vec::new();
        let mut overflow_pages = Vec::new();
        let mut current = root_id;
        loop {
            let page = self.page_mut(current)?;
            records.extend(page.read_all_records());
            page.delete_all_records();
            let next = page.next();
            if current != root_id {
                overflow_pages.push(current);
            }
            if next == 0 {
                break;
            }
            current = next;
        }

        self.page_mut(root_id)?.set_next(0);
        for id in overflow_pages {
            if let Some(mut page) = self.pool.remove(id) {
                page.set_next(0);
            }
            self.pool.push_free(id);
        }

        for (key, value) in records {
            let bucket = self.bucket_of(&key);
            let root = self.meta.bucket_to_page[bucket as usize];
            self.insert_into_chain(root, &key, &value, true)?;
        }

        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageId, Error> {
        let (id, recycled) = match self.pool.pop_free() {
            Some(id) => (id, true),
            None => {
                self.meta.pages += 1;
                let id = self.meta.pages;
                self.ensure_capacity(id)?;
                (id, false)
            }
        };

        let mut page = Page::new(id, self.meta.key_size, self.meta.value_size);
        if recycled {
            // The id's on-disk frame still holds a prior chain's bytes, including a `next`
            // pointer that may point into a different bucket's chain. Mark dirty so the
            // zeroed-and-detached page this struct represents is guaranteed to be written
            // back before the next flush or close, rather than leaving stale bytes resident
            // on disk if this page never gets a write_record call of its own.
            page.dirty = true;
        }
        if let Some(evicted) = self.pool.insert(page) {
            if evicted.dirty {
                self.write_to_disk(&evicted)?;
            }
        }
        Ok(id)
    }

    fn page_mut(&mut self, id: PageId) -> Result<&mut Page, Error> {
        if !self.pool.contains(id) {
            let page = self.read_page_from_disk(id)?;
            if let Some(evicted) = self.pool.insert(page) {
                if evicted.dirty {
                    self.write_to_disk(&evicted)?;
                }
            }
        }
        Ok(self.pool.get_mut(id).expect("just loaded or already resident"))
    }

    fn read_page_from_disk(&mut self, id: PageId) -> Result<Page, Error> {
        let mut buf = [0u8; PAGE_SIZE];
        self.reader.seek(SeekFrom::Start(id * PAGE_SIZE as u64))?;
        self.reader.read_exact(&mut buf)?;
        trace!("read page {id} from disk");
        Ok(Page::from_bytes(id, self.meta.key_size, self.meta.value_size, &buf))
    }

    fn write_to_disk(&mut self, page: &Page) -> Result<(), Error> {
        let bytes = page.to_bytes();
        self.writer.seek(SeekFrom::Start(page.id * PAGE_SIZE as u64))?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        trace!("wrote page {} to disk", page.id);
        Ok(())
    }

    fn flush_dirty(&mut self) -> Result<(), Error> {
        let mut writes = Vec::new();
        for page in self.pool.resident_mut() {
            if page.dirty {
                writes.push((page.id, page.to_bytes()));
                page.dirty = false;
            }
        }
        for (id, bytes) in writes {
            self.writer.seek(SeekFrom::Start(id * PAGE_SIZE as u64))?;
            self.writer.write_all(&bytes)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Extends the backing file so page `id`'s full byte range is valid to read and
    /// write, by seeking to its last byte and writing a single zero byte. Bytes before it
    /// become an implicit sparse hole read back as zero.
    fn ensure_capacity(&mut self, id: PageId) -> Result<(), Error> {
        let last_byte = (id + 1) * PAGE_SIZE as u64 - 1;
        self.writer.seek(SeekFrom::Start(last_byte))?;
        self.writer.write_all(&[0u8])?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_meta(&mut self) -> Result<(), Error> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.reader.seek(SeekFrom::Start(0))?;
        self.reader.read_exact(&mut buf)?;
        self.meta = Meta::from_bytes(&buf)?;
        Ok(())
    }

    fn write_meta(&mut self) -> Result<(), Error> {
        let mut buf = self.meta.to_bytes();
        if buf.len() > PAGE_SIZE {
            let reason = format!("meta page grew to {} bytes, exceeding {PAGE_SIZE}", buf.len());
            error!("corrupt meta: {reason}");
            return Err(Error::CorruptMeta { reason });
        }
        buf.resize(PAGE_SIZE, 0);
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&buf)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for Store {
    /// Best-effort flush on drop, mirroring the pager's drop-flushes idiom. `close` is the
    /// supported way to observe I/O errors; this is a backstop for stores dropped without
    /// it.
    fn drop(&mut self) {
        let _ = self.flush_dirty();
        let _ = self.write_meta();
    }
}
