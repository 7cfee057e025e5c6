//! Commitment trie with on-demand node resolution
//!
//! This implements a radix trie where:
//! - Each node's commitment is derived from its own bytes and its children's commitments
//! - Any subtree may be hollow: known only by its storage key until something reads it
//! - Changed nodes are tracked as dirty so they can be written back in one pass

mod node;
mod resolver;
mod tree;

pub use node::{BranchNode, HollowNode, LeafNode, Node};
pub use resolver::{NodeResolver, Resolution};
pub use tree::{MerkleTrie, TrieStats};
