//! Commitment trie over partially resident nodes

use super::node::{branch_commitment, BranchNode, LeafNode, Node};
use super::resolver::Resolution;
use crate::model::{Hash, StorageKey};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::btree_map::Entry;

/// Residency snapshot of the nodes currently in memory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TrieStats {
    pub resident: usize,
    pub hollow: usize,
    pub dirty: usize,
}

/// A radix trie whose every node commits to its subtree.
///
/// Any node below the root may be hollow. Operations that reach one
/// page it in through the [`Resolution`] they were given.
#[derive(Debug, Default)]
pub struct MerkleTrie {
    root: Option<Node>,
}

impl MerkleTrie {
    /// Create a new empty trie
    pub fn new() -> Self {
        MerkleTrie { root: None }
    }

    /// A trie whose root is still in storage under [`StorageKey::root`]
    pub fn with_stored_root() -> Self {
        MerkleTrie {
            root: Some(Node::hollow(StorageKey::root(), None)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Whether anything changed since the last [`MerkleTrie::mark_clean`].
    /// Every change dirties the whole path up to the root.
    pub fn is_dirty(&self) -> bool {
        self.root.as_ref().is_some_and(Node::is_dirty)
    }

    /// Get a value by key
    pub fn get(&mut self, key: &[u8], res: Resolution<'_>) -> Result<Option<Vec<u8>>> {
        match self.root.as_mut() {
            Some(root) => get_at(root, key, res),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a key-value pair
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>, res: Resolution<'_>) -> Result<()> {
        match self.root.as_mut() {
            Some(root) => insert_at(root, key, value, res),
            None => {
                self.root = Some(Node::leaf(key.to_vec(), value));
                Ok(())
            }
        }
    }

    /// Compute the root commitment, caching it on every node visited
    pub fn commit(&mut self, res: Resolution<'_>) -> Result<Hash> {
        match self.root.as_mut() {
            Some(root) => commit_node(root, res),
            None => Ok(Hash::ZERO),
        }
    }

    /// Visit every dirty resident node with its storage key, parents first.
    ///
    /// A clean node heads a clean subtree, so the walk stops there.
    pub fn walk_dirty<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&StorageKey, &Node) -> Result<()>,
    {
        match &self.root {
            Some(root) => walk_dirty(root, &StorageKey::root(), &mut f),
            None => Ok(()),
        }
    }

    /// Mark every dirty node as written back
    pub fn mark_clean(&mut self) {
        if let Some(root) = self.root.as_mut() {
            mark_clean(root);
        }
    }

    pub fn stats(&self) -> TrieStats {
        let mut stats = TrieStats::default();
        if let Some(root) = &self.root {
            count(root, &mut stats);
        }
        stats
    }
}

fn materialize_in_place(node: &mut Node, res: Resolution<'_>) -> Result<()> {
    let resolved = match node {
        Node::Hollow(hollow) => res.materialize(&hollow.key, hollow.commitment)?,
        _ => return Ok(()),
    };
    *node = resolved;
    Ok(())
}

fn get_at(node: &mut Node, key: &[u8], res: Resolution<'_>) -> Result<Option<Vec<u8>>> {
    materialize_in_place(node, res)?;

    match node {
        Node::Leaf(leaf) => Ok((leaf.suffix == key).then(|| leaf.value.clone())),
        Node::Branch(branch) => {
            let Some(rest) = key.strip_prefix(branch.prefix.as_slice()) else {
                return Ok(None);
            };
            match rest.split_first() {
                None => Ok(branch.value.clone()),
                Some((byte, tail)) => match branch.children.get_mut(byte) {
                    Some(child) => get_at(child, tail, res),
                    None => Ok(None),
                },
            }
        }
        Node::Hollow(hollow) => Err(Error::UnresolvedNode(hollow.key.to_string())),
    }
}

fn insert_at(node: &mut Node, key: &[u8], value: Vec<u8>, res: Resolution<'_>) -> Result<()> {
    materialize_in_place(node, res)?;

    match node {
        Node::Leaf(leaf) if leaf.suffix == key => {
            leaf.value = value;
            leaf.meta.touch();
            Ok(())
        }
        Node::Leaf(leaf) => {
            let existing = std::mem::take(leaf);
            *node = Node::Branch(split_leaf(existing, key, value));
            Ok(())
        }
        Node::Branch(branch) => {
            let common = common_prefix_len(&branch.prefix, key);
            if common < branch.prefix.len() {
                let existing = std::mem::take(branch);
                *node = Node::Branch(split_branch(existing, common, key, value));
                return Ok(());
            }

            match key[common..].split_first() {
                None => branch.value = Some(value),
                Some((byte, tail)) => match branch.children.entry(*byte) {
                    Entry::Occupied(entry) => insert_at(entry.into_mut(), tail, value, res)?,
                    Entry::Vacant(entry) => {
                        entry.insert(Node::leaf(tail.to_vec(), value));
                    }
                },
            }
            // Only after the subtree accepted the write.
            branch.meta.touch();
            Ok(())
        }
        Node::Hollow(hollow) => Err(Error::UnresolvedNode(hollow.key.to_string())),
    }
}

/// Turn a leaf into a branch holding both the old and the new key
fn split_leaf(existing: LeafNode, key: &[u8], value: Vec<u8>) -> BranchNode {
    let LeafNode {
        suffix,
        value: existing_value,
        ..
    } = existing;
    let common = common_prefix_len(&suffix, key);

    let mut branch = BranchNode::new(key[..common].to_vec());
    place(&mut branch, &suffix[common..], existing_value);
    place(&mut branch, &key[common..], value);
    branch
}

/// Cut a branch's prefix at `common`, pushing the branch one level down.
///
/// The pushed-down branch starts at a new position, so it is dirty even
/// though its content is unchanged. Its own children keep their absolute
/// positions.
fn split_branch(mut existing: BranchNode, common: usize, key: &[u8], value: Vec<u8>) -> BranchNode {
    let mut top = BranchNode::new(existing.prefix[..common].to_vec());
    let byte = existing.prefix[common];
    existing.prefix = existing.prefix[common + 1..].to_vec();
    existing.meta.touch();
    top.children.insert(byte, Node::Branch(existing));
    place(&mut top, &key[common..], value);
    top
}

fn place(branch: &mut BranchNode, rest: &[u8], value: Vec<u8>) {
    match rest.split_first() {
        None => branch.value = Some(value),
        Some((byte, tail)) => {
            branch.children.insert(*byte, Node::leaf(tail.to_vec(), value));
        }
    }
}

fn commit_node(node: &mut Node, res: Resolution<'_>) -> Result<Hash> {
    if let Some(commitment) = node.cached_commitment() {
        return Ok(commitment);
    }

    materialize_in_place(node, res)?;
    if let Some(commitment) = node.cached_commitment() {
        return Ok(commitment);
    }

    match node {
        Node::Leaf(leaf) => {
            let commitment = leaf.commitment();
            leaf.meta.commitment = Some(commitment);
            Ok(commitment)
        }
        Node::Branch(branch) => {
            let mut children = Vec::with_capacity(branch.children.len());
            for (byte, child) in branch.children.iter_mut() {
                children.push((*byte, commit_node(child, res)?));
            }
            let commitment = branch_commitment(&branch.prefix, branch.value.as_deref(), children);
            branch.meta.commitment = Some(commitment);
            Ok(commitment)
        }
        Node::Hollow(hollow) => Err(Error::UnresolvedNode(hollow.key.to_string())),
    }
}

fn walk_dirty<F>(node: &Node, key: &StorageKey, f: &mut F) -> Result<()>
where
    F: FnMut(&StorageKey, &Node) -> Result<()>,
{
    if !node.is_dirty() {
        return Ok(());
    }

    f(key, node)?;

    if let Node::Branch(branch) = node {
        for (byte, child) in &branch.children {
            walk_dirty(child, &key.child(&branch.prefix, *byte), f)?;
        }
    }
    Ok(())
}

fn mark_clean(node: &mut Node) {
    if !node.is_dirty() {
        return;
    }
    if let Some(meta) = node.meta_mut() {
        meta.dirty = false;
    }
    if let Node::Branch(branch) = node {
        for child in branch.children.values_mut() {
            mark_clean(child);
        }
    }
}

fn count(node: &Node, stats: &mut TrieStats) {
    match node {
        Node::Hollow(_) => stats.hollow += 1,
        Node::Leaf(_) | Node::Branch(_) => {
            stats.resident += 1;
            if node.is_dirty() {
                stats.dirty += 1;
            }
        }
    }
    if let Node::Branch(branch) = node {
        for child in branch.children.values() {
            count(child, stats);
        }
    }
}

/// Find the length of the common prefix between two byte slices
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
