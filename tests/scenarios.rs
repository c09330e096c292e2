//! Integration suite exercising the store's public contract end to end.
//!
//! Each test corresponds to one of the concrete scenarios (S1-S6) used to validate this
//! crate's design: construction, overwrite, basic get/delete, growth, and persistence across
//! close/reopen.

use linhash_kv::{Error, Store};
use tempdir::TempDir;

fn db_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("store.db")
}

fn pad(bytes: &[u8], size: usize) -> Vec<u8> {
    let mut padded = bytes.to_vec();
    padded.resize(size, 0);
    padded
}

/// S1: a freshly opened store accepts a put with no error.
#[test]
fn s1_open_and_put_succeeds() {
    let dir = TempDir::new("linhash-s1").unwrap();
    let mut store = Store::open(2, 16, 0.8, db_path(&dir)).unwrap();
    store.put(b"key", b"value").unwrap();
}

/// S2: putting the same key twice overwrites the value in place.
#[test]
fn s2_put_twice_overwrites() {
    let dir = TempDir::new("linhash-s2").unwrap();
    let mut store = Store::open(2, 16, 0.8, db_path(&dir)).unwrap();
    store.put(b"key", b"value").unwrap();
    store.put(b"key", b"expected").unwrap();
    assert_eq!(store.get(b"key").unwrap(), Some(pad(b"expected", 8)));
}

/// S3: a plain put is visible to a following get.
#[test]
fn s3_put_then_get_returns_value() {
    let dir = TempDir::new("linhash-s3").unwrap();
    let mut store = Store::open(2, 16, 0.8, db_path(&dir)).unwrap();
    store.put(b"key", b"expected").unwrap();
    assert_eq!(store.get(b"key").unwrap(), Some(pad(b"expected", 8)));
}

/// S4: delete removes a key so a following get misses.
#[test]
fn s4_put_get_delete_get() {
    let dir = TempDir::new("linhash-s4").unwrap();
    let mut store = Store::open(2, 16, 0.8, db_path(&dir)).unwrap();
    store.put(b"key", b"expected").unwrap();
    assert_eq!(store.get(b"key").unwrap(), Some(pad(b"expected", 8)));
    assert!(store.delete(b"key").unwrap());
    assert_eq!(store.get(b"key").unwrap(), None);
}

/// S5: growth survives. `initial_buckets = 2`, K = V = 8 gives a ~232-slot-per-page cap, so
/// inserting ~400 distinct keys at a 0.8 split threshold is guaranteed to trigger at least
/// one split; every key must remain retrievable afterward.
#[test]
fn s5_records_survive_growth() {
    let dir = TempDir::new("linhash-s5").unwrap();
    let mut store = Store::open(2, 16, 0.8, db_path(&dir)).unwrap();

    let keys: Vec<Vec<u8>> = (0..400u32).map(|i| i.to_le_bytes().to_vec()).collect();
    for key in &keys {
        store.put(key, key).unwrap();
    }

    for key in &keys {
        assert_eq!(store.get(key).unwrap(), Some(pad(key, 8)));
    }
}

/// S6: S5, followed by close and reopen; every key must survive the round trip.
#[test]
fn s6_records_survive_close_and_reopen() {
    let dir = TempDir::new("linhash-s6").unwrap();
    let path = db_path(&dir);
    let keys: Vec<Vec<u8>> = (0..400u32).map(|i| i.to_le_bytes().to_vec()).collect();

    {
        let mut store = Store::open(2, 16, 0.8, path.clone()).unwrap();
        for key in &keys {
            store.put(key, key).unwrap();
        }
        store.close().unwrap();
    }

    let mut reopened = Store::open(2, 16, 0.8, path).unwrap();
    for key in &keys {
        assert_eq!(reopened.get(key).unwrap(), Some(pad(key, 8)));
    }
}

/// Oversized keys and values are rejected without mutating the store, per the error
/// taxonomy in the spec's error-handling section.
#[test]
fn oversized_key_and_value_are_rejected_with_no_side_effect() {
    let dir = TempDir::new("linhash-errors").unwrap();
    let mut store = Store::open(2, 16, 0.8, db_path(&dir)).unwrap();

    let err = store.put(b"a key that is far too long", b"v").unwrap_err();
    assert!(matches!(err, Error::KeyTooLarge));

    let err = store.put(b"k", b"a value that is far too long").unwrap_err();
    assert!(matches!(err, Error::ValueTooLarge));

    assert_eq!(store.get(b"k").unwrap(), None);
}
