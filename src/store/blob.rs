//! Blob envelope - the on-disk form of a serialized trie node

use crate::{Error, Result};

/// Envelope format written in the first byte of every blob
pub const BLOB_FORMAT_VERSION: u8 = 1;

/// Type tag for blobs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobType {
    /// A trie leaf
    Leaf,
    /// A trie branch
    Branch,
}

impl BlobType {
    pub fn as_byte(&self) -> u8 {
        match self {
            BlobType::Leaf => 0,
            BlobType::Branch => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(BlobType::Leaf),
            1 => Some(BlobType::Branch),
            _ => None,
        }
    }
}

/// A blob is a typed, compressed chunk of data
#[derive(Clone, Debug)]
pub struct Blob {
    /// Type of content
    pub blob_type: BlobType,
    /// Raw data (uncompressed)
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(blob_type: BlobType, data: Vec<u8>) -> Self {
        Blob { blob_type, data }
    }

    /// Compress the blob for storage
    ///
    /// Layout: `[version][type][zstd(data)]`.
    pub fn compress(&self, level: i32) -> Result<Vec<u8>> {
        let compressed = zstd::encode_all(self.data.as_slice(), level)
            .map_err(|e| Error::Serialization(format!("zstd encode: {}", e)))?;
        let mut output = Vec::with_capacity(compressed.len() + 2);
        output.push(BLOB_FORMAT_VERSION);
        output.push(self.blob_type.as_byte());
        output.extend(compressed);
        Ok(output)
    }

    /// Decompress a blob read back from storage
    pub fn decompress(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(Error::Corruption("Truncated blob".into()));
        }

        if data[0] != BLOB_FORMAT_VERSION {
            return Err(Error::VersionMismatch {
                expected: BLOB_FORMAT_VERSION as u32,
                found: data[0] as u32,
            });
        }

        let blob_type = BlobType::from_byte(data[1])
            .ok_or_else(|| Error::Corruption(format!("Invalid blob type: {}", data[1])))?;

        let decompressed = zstd::decode_all(&data[2..])
            .map_err(|e| Error::Corruption(format!("zstd decode: {}", e)))?;

        Ok(Blob {
            blob_type,
            data: decompressed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_roundtrip() {
        let original = Blob::new(BlobType::Branch, b"hello world".to_vec());
        let compressed = original.compress(3).unwrap();
        let restored = Blob::decompress(&compressed).unwrap();

        assert_eq!(original.blob_type, restored.blob_type);
        assert_eq!(original.data, restored.data);
    }

    #[test]
    fn test_decompress_rejects_unknown_version() {
        let mut bytes = Blob::new(BlobType::Leaf, b"x".to_vec()).compress(3).unwrap();
        bytes[0] = 9;
        assert!(matches!(
            Blob::decompress(&bytes),
            Err(Error::VersionMismatch { found: 9, .. })
        ));
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(matches!(Blob::decompress(&[1]), Err(Error::Corruption(_))));
        assert!(matches!(
            Blob::decompress(&[1, 7, 0, 0]),
            Err(Error::Corruption(_))
        ));
        assert!(matches!(
            Blob::decompress(&[1, 0, 0xde, 0xad]),
            Err(Error::Corruption(_))
        ));
    }
}
