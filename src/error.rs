//! Error types for ctree_db

use thiserror::Error;

/// Result type alias for ctree_db operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ctree_db operations
#[derive(Error, Debug)]
pub enum Error {
    /// The backing engine could not be opened, read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),

    /// A storage key has no serialized node behind it
    #[error("Node not found: {0}")]
    NotFound(String),

    /// A resolve-free read reached a hollow node
    #[error("Unresolved node: {0}")]
    UnresolvedNode(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the operation (after operator intervention) can succeed.
    ///
    /// Only backing-store faults qualify. Missing nodes, corruption and
    /// unresolved reads point at structural or caller problems.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_faults_are_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(Error::from(io).is_retryable());
        assert!(!Error::NotFound("6e".into()).is_retryable());
        assert!(!Error::UnresolvedNode("6e".into()).is_retryable());
        assert!(!Error::Corruption("bad frame".into()).is_retryable());
    }
}
