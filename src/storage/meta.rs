//! Encoding for the store's meta page.
//!
//! The meta page is page id `0` in the backing file. It carries everything needed to
//! reopen a store without rescanning the file: the linear-hash growth counters, the record
//! and page counts, the configured key/value sizes, and the `bucket_to_page` table mapping
//! each bucket to the id of its first page.
//!
//! Unlike the rest of the store, the meta page has no fixed slot layout — it is one
//! coherent little-endian encoding, written out fully on every [`Meta::close`]-triggered
//! persist rather than updated field-by-field in place.
//!
//! # Layout
//!
//! ```text
//! u64   buckets
//! u64   split_pointer
//! u64   record_count
//! u64   pages
//! u16   key_size
//! u16   value_size
//! u64   bucket_to_page length (N)
//! u64 * N   bucket_to_page entries, in bucket order
//! ```
//!
//! # See Also
//! - [`store`](crate::storage::store): reads and writes the meta page on open/close.

use log::error;

use super::Error;
use super::page::PageId;

/// Fixed-width portion of the meta encoding, before the variable-length bucket table.
const HEADER_SIZE: usize = 8 * 4 + 2 * 2 + 8;

/// Persistent state of the linear-hash index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub buckets: u64,
    pub split_pointer: u64,
    pub record_count: u64,
    pub pages: u64,
    pub key_size: u16,
    pub value_size: u16,
    pub bucket_to_page: Vec<PageId>,
}

impl Meta {
    /// Meta describing a freshly initialized, empty store with a single bucket.
    pub fn new(key_size: u16, value_size: u16) -> Self {
        Self {
            buckets: 1,
            split_pointer: 0,
            record_count: 0,
            pages: 0,
            key_size,
            value_size,
            bucket_to_page: Vec::new(),
        }
    }

    /// Serializes the meta page to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.bucket_to_page.len() * 8);
        buf.extend_from_slice(&self.buckets.to_le_bytes());
        buf.extend_from_slice(&self.split_pointer.to_le_bytes());
        buf.extend_from_slice(&self.record_count.to_le_bytes());
        buf.extend_from_slice(&self.pages.to_le_bytes());
        buf.extend_from_slice(&self.key_size.to_le_bytes());
        buf.extend_from_slice(&self.value_size.to_le_bytes());
        buf.extend_from_slice(&(self.bucket_to_page.len() as u64).to_le_bytes());
        for page_id in &self.bucket_to_page {
            buf.extend_from_slice(&page_id.to_le_bytes());
        }
        buf
    }

    /// Parses a meta page from bytes, failing if the encoding is malformed or truncated.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            let reason = format!("meta page shorter than header ({} bytes)", bytes.len());
            error!("corrupt meta: {reason}");
            return Err(Error::CorruptMeta { reason });
        }

        let mut offset = 0;
        let mut next_u64 = |offset: &mut usize| -> u64 {
            let value = u64::from_le_bytes(bytes[*offset..*offset + 8].try_into().expect("checked len"));
            *offset += 8;
            value
        };

        let buckets = next_u64(&mut offset);
        let split_pointer = next_u64(&mut offset);
        let record_count = next_u64(&mut offset);
        let pages = next_u64(&mut offset);
        let key_size = u16::from_le_bytes(bytes[offset..offset + 2].try_into().expect("checked len"));
        offset += 2;
        let value_size = u16::from_le_bytes(bytes[offset..offset + 2].try_into().expect("checked len"));
        offset += 2;
        let len = next_u64(&mut offset) as usize;

        let expected = HEADER_SIZE + len * 8;
        if bytes.len() < expected {
            let reason =
                format!("bucket_to_page table truncated: expected {expected} bytes, got {}", bytes.len());
            error!("corrupt meta: {reason}");
            return Err(Error::CorruptMeta { reason });
        }

        let mut bucket_to_page = Vec::with_capacity(len);
        for _ in 0..len {
            bucket_to_page.push(next_u64(&mut offset));
        }

        Ok(Self {
            buckets,
            split_pointer,
            record_count,
            pages,
            key_size,
            value_size,
            bucket_to_page,
        })
    }
}
