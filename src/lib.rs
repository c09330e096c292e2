//! An embeddable, single-file key-value store built on **linear hashing** over
//! fixed-size disk pages with an in-memory page buffer.
//!
//! Keys and values are fixed-maximum-size opaque byte strings. Records are persisted in a
//! single backing file and located in amortized constant time; the table grows by splitting
//! one bucket at a time as it fills, rather than rehashing the whole table at once.
//!
//! # Overview
//!
//! Three pieces make up the engine, and they are inseparable: the index drives page
//! allocation, the buffer mediates every page access, and the on-disk format defines what
//! both must preserve.
//!
//! - [`storage::page`]: the on-disk page layout — a slot directory plus a dense array of
//!   fixed-size records.
//! - [`storage::buffer`]: a bounded, LRU-evicting cache of resident pages with a free list of
//!   recyclable frames.
//! - [`storage::store`]: the linear-hashing index itself — bucket lookup, growth/splitting,
//!   meta persistence, and the public [`Store`] API.
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
//! # Non-goals
//!
//! No CLI, no network protocol, no transactions or write-ahead logging, no range scans or
//! secondary indexes, no variable-length records. See the crate's design notes for the
//! reasoning behind each.
pub mod storage;

pub use storage::Error;
pub use storage::store::Store;
