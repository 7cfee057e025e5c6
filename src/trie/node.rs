//! Trie node types

use crate::model::{Hash, StorageKey};
use crate::store::{Blob, BlobType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LEAF_TAG: u8 = 0x01;
const BRANCH_TAG: u8 = 0x02;

/// Bookkeeping shared by resident nodes
#[derive(Clone, Debug, Default)]
pub(crate) struct NodeMeta {
    /// Cached commitment, cleared whenever the subtree changes
    pub(crate) commitment: Option<Hash>,
    /// Changed since it was last resolved or flushed
    pub(crate) dirty: bool,
}

impl NodeMeta {
    fn fresh() -> Self {
        NodeMeta {
            commitment: None,
            dirty: true,
        }
    }

    fn clean(commitment: Hash) -> Self {
        NodeMeta {
            commitment: Some(commitment),
            dirty: false,
        }
    }

    /// Record a change to this node or something below it
    pub(crate) fn touch(&mut self) {
        self.commitment = None;
        self.dirty = true;
    }
}

/// A resident node holding the tail of a single key
#[derive(Clone, Debug, Default)]
pub struct LeafNode {
    pub(crate) suffix: Vec<u8>,
    pub(crate) value: Vec<u8>,
    pub(crate) meta: NodeMeta,
}

/// A resident node fanning out on the byte after its prefix
#[derive(Clone, Debug, Default)]
pub struct BranchNode {
    /// Bytes shared by every key below this node
    pub(crate) prefix: Vec<u8>,
    /// Value of the key ending exactly at this node
    pub(crate) value: Option<Vec<u8>>,
    pub(crate) children: BTreeMap<u8, Node>,
    pub(crate) meta: NodeMeta,
}

/// A node known only by where it is stored
#[derive(Clone, Debug)]
pub struct HollowNode {
    pub(crate) key: StorageKey,
    /// Commitment recorded by the parent, absent for a hollow root
    pub(crate) commitment: Option<Hash>,
}

/// A node in the commitment trie
#[derive(Clone, Debug)]
pub enum Node {
    Leaf(LeafNode),
    Branch(BranchNode),
    Hollow(HollowNode),
}

/// Persisted form of a resident node. Children are recorded by commitment
/// only; their storage keys follow from the parent's position.
#[derive(Serialize, Deserialize)]
enum StoredNode {
    Leaf {
        suffix: Vec<u8>,
        value: Vec<u8>,
    },
    Branch {
        prefix: Vec<u8>,
        value: Option<Vec<u8>>,
        children: Vec<(u8, Hash)>,
    },
}

impl LeafNode {
    pub(crate) fn new(suffix: Vec<u8>, value: Vec<u8>) -> Self {
        LeafNode {
            suffix,
            value,
            meta: NodeMeta::fresh(),
        }
    }

    pub(crate) fn commitment(&self) -> Hash {
        leaf_commitment(&self.suffix, &self.value)
    }
}

impl BranchNode {
    pub(crate) fn new(prefix: Vec<u8>) -> Self {
        BranchNode {
            prefix,
            value: None,
            children: BTreeMap::new(),
            meta: NodeMeta::fresh(),
        }
    }
}

impl Node {
    pub(crate) fn leaf(suffix: Vec<u8>, value: Vec<u8>) -> Self {
        Node::Leaf(LeafNode::new(suffix, value))
    }

    pub(crate) fn hollow(key: StorageKey, commitment: Option<Hash>) -> Self {
        Node::Hollow(HollowNode { key, commitment })
    }

    /// Whether this node has changes not yet written back
    pub fn is_dirty(&self) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.meta.dirty,
            Node::Branch(branch) => branch.meta.dirty,
            Node::Hollow(_) => false,
        }
    }

    /// The commitment if it is known without further work
    pub fn cached_commitment(&self) -> Option<Hash> {
        match self {
            Node::Leaf(leaf) => leaf.meta.commitment,
            Node::Branch(branch) => branch.meta.commitment,
            Node::Hollow(hollow) => hollow.commitment,
        }
    }

    pub(crate) fn meta_mut(&mut self) -> Option<&mut NodeMeta> {
        match self {
            Node::Leaf(leaf) => Some(&mut leaf.meta),
            Node::Branch(branch) => Some(&mut branch.meta),
            Node::Hollow(_) => None,
        }
    }

    /// Serialize a resident node for storage.
    ///
    /// Every child must already carry a commitment, so callers commit the
    /// trie first.
    pub fn serialize(&self, compression_level: i32) -> Result<Vec<u8>> {
        let (blob_type, stored) = match self {
            Node::Leaf(leaf) => (
                BlobType::Leaf,
                StoredNode::Leaf {
                    suffix: leaf.suffix.clone(),
                    value: leaf.value.clone(),
                },
            ),
            Node::Branch(branch) => {
                let mut children = Vec::with_capacity(branch.children.len());
                for (byte, child) in &branch.children {
                    let commitment = child.cached_commitment().ok_or_else(|| {
                        Error::Serialization(format!(
                            "Child 0x{:02x} has no commitment; commit before serializing",
                            byte
                        ))
                    })?;
                    children.push((*byte, commitment));
                }
                (
                    BlobType::Branch,
                    StoredNode::Branch {
                        prefix: branch.prefix.clone(),
                        value: branch.value.clone(),
                        children,
                    },
                )
            }
            Node::Hollow(hollow) => {
                return Err(Error::Serialization(format!(
                    "Cannot serialize hollow node {}",
                    hollow.key
                )))
            }
        };

        let data = bincode::serialize(&stored)?;
        Blob::new(blob_type, data).compress(compression_level)
    }

    /// Rebuild the node stored under `key`. Children come back hollow,
    /// the node itself comes back clean with its commitment cached.
    pub fn deserialize(key: &StorageKey, bytes: &[u8]) -> Result<Node> {
        let blob = Blob::decompress(bytes)?;
        let stored: StoredNode = bincode::deserialize(&blob.data)
            .map_err(|e| Error::Corruption(format!("Node {}: {}", key, e)))?;

        match (blob.blob_type, stored) {
            (BlobType::Leaf, StoredNode::Leaf { suffix, value }) => {
                let commitment = leaf_commitment(&suffix, &value);
                Ok(Node::Leaf(LeafNode {
                    suffix,
                    value,
                    meta: NodeMeta::clean(commitment),
                }))
            }
            (
                BlobType::Branch,
                StoredNode::Branch {
                    prefix,
                    value,
                    children,
                },
            ) => {
                let commitment = branch_commitment(
                    &prefix,
                    value.as_deref(),
                    children.iter().map(|(byte, hash)| (*byte, *hash)),
                );
                let children = children
                    .into_iter()
                    .map(|(byte, hash)| (byte, Node::hollow(key.child(&prefix, byte), Some(hash))))
                    .collect();
                Ok(Node::Branch(BranchNode {
                    prefix,
                    value,
                    children,
                    meta: NodeMeta::clean(commitment),
                }))
            }
            (blob_type, _) => Err(Error::Corruption(format!(
                "Node {} tagged {:?} holds a different node kind",
                key, blob_type
            ))),
        }
    }
}

pub(crate) fn leaf_commitment(suffix: &[u8], value: &[u8]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[LEAF_TAG]);
    hasher.update(&(suffix.len() as u64).to_le_bytes());
    hasher.update(suffix);
    hasher.update(Hash::digest(value).as_bytes());
    hasher.finalize().into()
}

pub(crate) fn branch_commitment(
    prefix: &[u8],
    value: Option<&[u8]>,
    children: impl IntoIterator<Item = (u8, Hash)>,
) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[BRANCH_TAG]);
    hasher.update(&(prefix.len() as u64).to_le_bytes());
    hasher.update(prefix);
    match value {
        Some(value) => {
            hasher.update(&[1]);
            hasher.update(Hash::digest(value).as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
    for (byte, commitment) in children {
        hasher.update(&[byte]);
        hasher.update(commitment.as_bytes());
    }
    hasher.finalize().into()
}
