//! # ctree_db
//!
//! A persistent commitment trie that does not have to fit in memory.
//!
//! The trie's nodes live in an embedded key-value store and are paged in
//! on demand: a node that has not been read yet is *hollow*, known only by
//! its storage key. Reads, writes and commitment computation resolve hollow
//! nodes as they reach them, and a flush writes every changed node back in
//! one atomic batch.
//!
//! ## Core Concepts
//!
//! - **Commitment**: a BLAKE3 digest over the whole logical key-value state
//! - **Hollow node**: a subtree still in storage, resolved on first touch
//! - **Flush**: all-or-nothing write-back of dirty nodes
//!
//! ## Example
//!
//! ```no_run
//! use ctree_db::Database;
//!
//! let db = Database::open_dir("state.db")?;
//! db.insert(b"a", b"1")?;
//! let commitment = db.commit()?;
//! db.close()?;
//!
//! let reopened = Database::open_dir("state.db")?;
//! assert_eq!(reopened.get(b"a")?, Some(b"1".to_vec()));
//! assert_eq!(reopened.commit()?, commitment);
//! # Ok::<(), ctree_db::Error>(())
//! ```

pub mod config;
pub mod model;
pub mod store;
pub mod trie;

mod database;
mod error;

pub use config::{TreeConfig, DEFAULT_TREE_DIRNAME};
pub use database::{Database, FlushStats};
pub use error::{Error, Result};
pub use model::{Hash, StorageKey};
pub use store::{FileStore, KvStore, MemoryStore, WriteBatch, WriteOptions};
pub use trie::{MerkleTrie, NodeResolver, Resolution, TrieStats};

/// Node log format version
pub const VERSION: u32 = 1;

/// Magic bytes for file identification
pub const MAGIC: &[u8; 8] = b"CTREE_KV";
