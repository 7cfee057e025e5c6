//! Durable key-value storage
//!
//! The trie only ever talks to storage through [`KvStore`]: point reads,
//! point writes and atomic write batches over raw byte keys.

mod blob;
mod file_store;
mod memory;

pub use blob::{Blob, BlobType, BLOB_FORMAT_VERSION};
pub use file_store::FileStore;
pub use memory::MemoryStore;

use crate::Result;
use bytes::Bytes;
use std::sync::Arc;

/// Options for a single write or batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Force the write to stable storage before returning
    pub sync: bool,
}

impl WriteOptions {
    pub fn synced() -> Self {
        WriteOptions { sync: true }
    }
}

/// An ordered set of writes applied all-or-nothing
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    size: usize,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `key -> value`; a later put of the same key wins
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        self.size += key.len() + value.len();
        self.entries.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total key and value bytes queued
    pub fn size_bytes(&self) -> usize {
        self.size
    }

    pub fn into_entries(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
    }
}

/// A persistent, ordered key-value engine
pub trait KvStore: Send + Sync {
    /// Point read. The returned buffer is owned by the caller.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Apply every entry of `batch`, or none of them
    fn write_batch(&self, batch: WriteBatch, opts: &WriteOptions) -> Result<()>;

    /// Flush buffered state to stable storage
    fn sync(&self) -> Result<()>;

    /// Number of live keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point write
    fn set(&self, key: &[u8], value: &[u8], opts: &WriteOptions) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_batch(batch, opts)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn write_batch(&self, batch: WriteBatch, opts: &WriteOptions) -> Result<()> {
        (**self).write_batch(batch, opts)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_batch_tracks_size() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.put(b"ab".to_vec(), b"cde".to_vec());
        batch.put(b"f".to_vec(), Vec::new());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_bytes(), 6);
    }

    #[test]
    fn test_arc_store_shares_state() {
        let store = Arc::new(MemoryStore::new());
        let alias = Arc::clone(&store);
        alias.set(b"k", b"v", &WriteOptions::default()).unwrap();
        assert_eq!(store.get(b"k").unwrap().as_deref(), Some(&b"v"[..]));
        assert!(KvStore::contains(&store, b"k").unwrap());
    }
}
