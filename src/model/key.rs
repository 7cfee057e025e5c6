//! Storage keys for serialized trie nodes

use std::fmt;

/// Namespace byte that prefixes every node record in the durable store
pub const NODE_NAMESPACE: u8 = b'n';

/// Byte key under which a node's serialized form is stored.
///
/// A key is the namespace byte followed by the absolute trie path at which
/// the node starts, so the root lives at `b"n"` and a branch child lives at
/// the parent's path, then the parent's prefix, then the child byte.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageKey(Vec<u8>);

impl StorageKey {
    /// Key of the node starting at `path`
    pub fn for_path(path: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(path.len() + 1);
        bytes.push(NODE_NAMESPACE);
        bytes.extend_from_slice(path);
        StorageKey(bytes)
    }

    /// Key of the root node
    pub fn root() -> Self {
        StorageKey(vec![NODE_NAMESPACE])
    }

    /// Key of the child reached through `prefix` and then `byte`
    pub fn child(&self, prefix: &[u8], byte: u8) -> Self {
        let mut bytes = Vec::with_capacity(self.0.len() + prefix.len() + 1);
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(prefix);
        bytes.push(byte);
        StorageKey(bytes)
    }

    /// The absolute trie path, without the namespace byte
    pub fn path(&self) -> &[u8] {
        &self.0[1..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_key_extends_path() {
        let root = StorageKey::root();
        assert_eq!(root.as_bytes(), b"n");
        assert_eq!(root.path(), b"");

        let child = root.child(b"ab", b'c');
        assert_eq!(child.path(), b"abc");
        assert_eq!(child, StorageKey::for_path(b"abc"));
        assert_eq!(child.child(b"", b'd').path(), b"abcd");
    }
}
