//! # podseal blob
//!
//! Upload and download of opaque byte blobs by content id.
//!
//! ## Overview
//!
//! The blob store only ever sees ciphertext. It has no business logic: a
//! `put` returns the content id the store assigned, a `get` returns the
//! exact bytes. Retries are opt-in and only apply to uploads; downloads fail
//! on the first non-success status so the caller decides what to do.
//!
//! ## Key Types
//!
//! - [`BlobStore`] - async trait for put / get / exists
//! - [`HttpBlobStore`] - HTTP client for a publisher/aggregator pair
//! - [`MemoryBlobStore`] - in-memory store with call counters for tests
//! - [`RetryPolicy`] - exponential backoff for uploads

pub mod error;
pub mod http;
pub mod memory;
pub mod retry;
pub mod traits;

pub use error::{BlobError, Result};
pub use http::HttpBlobStore;
pub use memory::MemoryBlobStore;
pub use retry::RetryPolicy;
pub use traits::{BlobStore, PutOptions, StoredBlob};
