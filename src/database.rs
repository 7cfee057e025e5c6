//! High-level Database API
//!
//! [`Database`] owns the trie and the store beneath it. It is the only
//! thing that touches the store: hollow nodes are resolved through it and
//! dirty nodes are flushed through it.

use crate::config::TreeConfig;
use crate::model::{Hash, StorageKey};
use crate::store::{FileStore, KvStore, WriteBatch};
use crate::trie::{MerkleTrie, NodeResolver, Resolution, TrieStats};
use crate::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;

/// What a flush wrote
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlushStats {
    /// Nodes written
    pub nodes: usize,
    /// Key and value bytes written
    pub bytes: usize,
}

/// A commitment trie persisted in a key-value store.
///
/// Every operation takes `&self` and runs under one lock around the trie,
/// so a `Database` can be shared between threads. All operations may block
/// on store I/O.
pub struct Database<S: KvStore = FileStore> {
    store: S,
    trie: Mutex<MerkleTrie>,
    config: TreeConfig,
}

/// Resolves storage keys against the store, copying each value out.
struct StoreResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<S: KvStore + ?Sized> NodeResolver for StoreResolver<'_, S> {
    fn resolve(&self, key: &StorageKey) -> Result<Vec<u8>> {
        match self.store.get(key.as_bytes()) {
            Ok(Some(bytes)) => {
                tracing::debug!(%key, bytes = bytes.len(), "resolved node");
                Ok(bytes.to_vec())
            }
            Ok(None) => Err(Error::NotFound(key.to_string())),
            Err(err) => {
                tracing::warn!(%key, error = %err, "node resolution failed");
                Err(err)
            }
        }
    }
}

impl Database<FileStore> {
    /// Open (or create) the store in `config.directory`
    pub fn open(config: &TreeConfig) -> Result<Self> {
        config.validate()?;
        let store = FileStore::open(&config.directory)?;
        Self::with_store(store, config.clone())
    }

    /// Open `dir`, honouring a `ctree.json` inside it
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(&TreeConfig::load(dir)?)
    }
}

impl<S: KvStore> Database<S> {
    /// Build a database over an already open store.
    ///
    /// If the store holds a root node the trie starts from it, hollow;
    /// otherwise the trie starts empty.
    pub fn with_store(store: S, config: TreeConfig) -> Result<Self> {
        config.validate()?;

        let trie = if store.contains(StorageKey::root().as_bytes())? {
            MerkleTrie::with_stored_root()
        } else {
            MerkleTrie::new()
        };

        tracing::debug!(
            directory = %config.directory.display(),
            stored_root = !trie.is_empty(),
            records = store.len(),
            "opened commitment tree"
        );

        Ok(Database {
            store,
            trie: Mutex::new(trie),
            config,
        })
    }

    fn resolver(&self) -> StoreResolver<'_, S> {
        StoreResolver { store: &self.store }
    }

    /// Look up `key`, resolving any hollow node on the way.
    ///
    /// `Ok(None)` means the key is not in the tree.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let resolver = self.resolver();
        self.trie.lock().get(key, Resolution::Enabled(&resolver))
    }

    /// Look up `key` using resident nodes only.
    ///
    /// Fails with [`Error::UnresolvedNode`] if the path needs a node that is
    /// still in storage; the tree is left untouched. Meant for inspecting
    /// residency, not for general reads.
    pub fn get_unresolved(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.trie.lock().get(key, Resolution::Disabled)
    }

    /// Insert or overwrite `key`
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let resolver = self.resolver();
        self.trie
            .lock()
            .insert(key, value.to_vec(), Resolution::Enabled(&resolver))
    }

    /// Commitment over the current logical state. Does not write.
    pub fn commit(&self) -> Result<Hash> {
        let resolver = self.resolver();
        self.trie.lock().commit(Resolution::Enabled(&resolver))
    }

    /// Write every dirty node back to the store in one atomic batch.
    ///
    /// Nodes are only marked clean once the batch is written. On error
    /// nothing is marked, so a later flush writes the same set again.
    pub fn flush(&self) -> Result<FlushStats> {
        let resolver = self.resolver();
        let mut trie = self.trie.lock();
        if !trie.is_dirty() {
            return Ok(FlushStats::default());
        }

        // Serialized branches carry their children's commitments.
        let root = trie.commit(Resolution::Enabled(&resolver))?;

        let level = self.config.compression_level;
        let mut batch = WriteBatch::new();
        trie.walk_dirty(|key, node| {
            batch.put(key.as_bytes(), node.serialize(level)?);
            Ok(())
        })?;

        let stats = FlushStats {
            nodes: batch.len(),
            bytes: batch.size_bytes(),
        };

        if let Err(err) = self.store.write_batch(batch, &self.config.write_options()) {
            tracing::error!(error = %err, nodes = stats.nodes, "flush failed, nodes stay dirty");
            return Err(err);
        }
        trie.mark_clean();

        tracing::info!(
            nodes = stats.nodes,
            bytes = stats.bytes,
            root = %root.short(),
            "flushed dirty nodes"
        );
        Ok(stats)
    }

    /// Flush, then sync the store to stable storage
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.store.sync()
    }

    /// Fetch the serialized node stored under `key`.
    ///
    /// A missing record is [`Error::NotFound`]: a hollow node that cannot be
    /// resolved means the stored tree is inconsistent.
    pub fn resolve_node(&self, key: &StorageKey) -> Result<Vec<u8>> {
        self.resolver().resolve(key)
    }

    /// Residency counts of the in-memory tree
    pub fn stats(&self) -> TrieStats {
        self.trie.lock().stats()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
