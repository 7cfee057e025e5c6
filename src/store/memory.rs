//! In-process key-value engine

use super::{KvStore, WriteBatch, WriteOptions};
use crate::Result;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An ordered map held entirely in memory.
///
/// Used for ephemeral trees and tests; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys in byte order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.read().keys().cloned().collect()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write_batch(&self, batch: WriteBatch, _opts: &WriteOptions) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in batch.into_entries() {
            entries.insert(key, Bytes::from(value));
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
