//! In-memory blob store.
//!
//! Content ids are the hex blake3 digest of the bytes, so storing the same
//! bytes twice returns the same id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use podseal_core::{Blake3Hash, ContentId};

use crate::error::{BlobError, Result};
use crate::traits::{BlobStore, PutOptions, StoredBlob};

/// In-memory blob store with call counters.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<ContentId, Bytes>>,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under a caller-chosen id.
    pub fn insert(&self, id: ContentId, data: impl Into<Bytes>) {
        self.blobs.write().unwrap().insert(id, data.into());
    }

    /// Number of `put` calls.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of `get` calls, including failed ones.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Vec<u8>, _options: PutOptions) -> Result<StoredBlob> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let content_id = ContentId::new(Blake3Hash::hash(&data).to_hex());
        self.blobs
            .write()
            .unwrap()
            .insert(content_id.clone(), Bytes::from(data));

        Ok(StoredBlob {
            url: format!("memory://{content_id}"),
            content_id,
        })
    }

    async fn get(&self, id: &ContentId) -> Result<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(BlobError::Fetch { status: 404 })
    }

    async fn exists(&self, id: &ContentId) -> Result<bool> {
        Ok(self.blobs.read().unwrap().contains_key(id))
    }
}
