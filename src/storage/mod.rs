//! Core abstractions and implementation for the on-disk key-value store.
//!
//! This module holds the three layers described at the crate root: the page format
//! ([`page`]), the buffer pool ([`buffer`]), and the linear-hashing index ([`store`]), plus
//! the meta-page encoding ([`meta`]) shared between `store` and persistence.
//!
//! # See Also
//! - [`store`]: the public [`Store`](store::Store) type and its `open`/`put`/`get`/`delete`/
//!   `close` contract.
pub mod buffer;
pub mod meta;
pub mod page;
pub mod store;

use std::io;

use thiserror::Error;

/// List of possible errors that can be thrown by the storage layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("key exceeds configured key size")]
    KeyTooLarge,

    #[error("value exceeds configured value size")]
    ValueTooLarge,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt meta page: {reason}")]
    CorruptMeta { reason: String },
}
