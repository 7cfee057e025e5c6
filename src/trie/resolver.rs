//! Capability through which the trie pages hollow nodes back in

use super::node::Node;
use crate::model::{Hash, StorageKey};
use crate::{Error, Result};

/// Fetches the serialized bytes of a node by its storage key.
///
/// Implementations must hand back an owned copy; the trie keeps the
/// returned buffer past the call.
pub trait NodeResolver {
    fn resolve(&self, key: &StorageKey) -> Result<Vec<u8>>;
}

impl<F> NodeResolver for F
where
    F: Fn(&StorageKey) -> Result<Vec<u8>>,
{
    fn resolve(&self, key: &StorageKey) -> Result<Vec<u8>> {
        self(key)
    }
}

/// Whether a traversal may page in hollow nodes
#[derive(Clone, Copy)]
pub enum Resolution<'a> {
    /// Hollow nodes are fetched through the resolver and materialized
    Enabled(&'a dyn NodeResolver),
    /// Reaching a hollow node fails with [`Error::UnresolvedNode`]
    Disabled,
}

impl<'a> Resolution<'a> {
    /// Fetch and decode the node behind `key`.
    ///
    /// When `expected` is known the decoded node must commit to it.
    pub(crate) fn materialize(&self, key: &StorageKey, expected: Option<Hash>) -> Result<Node> {
        let resolver = match self {
            Resolution::Enabled(resolver) => *resolver,
            Resolution::Disabled => return Err(Error::UnresolvedNode(key.to_string())),
        };

        let bytes = resolver.resolve(key)?;
        let node = Node::deserialize(key, &bytes)?;

        if let Some(expected) = expected {
            let found = node.cached_commitment().unwrap_or(Hash::ZERO);
            if found != expected {
                return Err(Error::Corruption(format!(
                    "Node {} commits to {}, parent expects {}",
                    key,
                    found.short(),
                    expected.short()
                )));
            }
        }

        tracing::trace!(%key, bytes = bytes.len(), "materialized node");
        Ok(node)
    }
}
