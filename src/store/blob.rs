//! Blob storage collaborator for profile images.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;

const URL_PREFIX: &str = "memory://profile-images/";

/// Upload-only blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return its download URL.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError>;
}

/// Emulated blob storage. Bytes are kept as uploaded, never decoded.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blobs(blobs: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            blobs: Mutex::new(blobs),
        }
    }

    /// Copy of every stored blob, keyed by path.
    pub fn blobs(&self) -> BTreeMap<String, Vec<u8>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Download URL for a stored path.
    pub fn url_for(path: &str) -> String {
        format!("{}{}", URL_PREFIX, path)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        if bytes.is_empty() {
            return Err(StoreError::Rejected {
                path: path.to_string(),
                reason: "empty upload".to_string(),
            });
        }

        tracing::debug!("Storing {} bytes at {}", bytes.len(), path);
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), bytes);
        Ok(Self::url_for(path))
    }
}
