//! Core value types: commitments and storage keys

mod hash;
mod key;

pub use hash::Hash;
pub use key::{StorageKey, NODE_NAMESPACE};
