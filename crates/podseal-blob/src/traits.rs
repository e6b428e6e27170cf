//! BlobStore trait: the abstract interface for ciphertext storage.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use podseal_core::ContentId;

use crate::error::Result;

/// Storage options for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    /// Number of storage epochs to keep the blob for.
    pub epochs: u32,
    /// Whether the blob can be deleted before it expires.
    pub deletable: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            epochs: 1,
            deletable: true,
        }
    }
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// The id assigned by the store.
    pub content_id: ContentId,
    /// Where the blob can be downloaded from.
    pub url: String,
}

/// Async interface for blob storage.
///
/// No retries and no caching happen behind this trait unless an
/// implementation documents otherwise.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` and return its content id.
    async fn put(&self, data: Vec<u8>, options: PutOptions) -> Result<StoredBlob>;

    /// Fetch the bytes stored under `id`.
    async fn get(&self, id: &ContentId) -> Result<Bytes>;

    /// Check whether `id` exists.
    async fn exists(&self, id: &ContentId) -> Result<bool>;
}
