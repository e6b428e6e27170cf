//! HTTP blob store client.
//!
//! Uploads go to a publisher (`PUT /v1/blobs`), downloads come from an
//! aggregator (`GET /v1/blobs/{id}`). The two may be different hosts.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use podseal_core::ContentId;

use crate::error::{BlobError, Result};
use crate::retry::RetryPolicy;
use crate::traits::{BlobStore, PutOptions, StoredBlob};

/// Publisher response for a blob stored for the first time.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    blob_object: BlobObject,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    blob_id: String,
}

/// Publisher response for a blob that was already stored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutResponse {
    newly_created: Option<NewlyCreated>,
    already_certified: Option<AlreadyCertified>,
}

impl PutResponse {
    fn into_blob_id(self) -> Option<String> {
        self.newly_created
            .map(|n| n.blob_object.blob_id)
            .or(self.already_certified.map(|a| a.blob_id))
    }
}

/// Blob store client over HTTP.
pub struct HttpBlobStore {
    publisher: String,
    aggregator: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpBlobStore {
    /// Create a client for the given publisher and aggregator endpoints.
    pub fn new(publisher: &str, aggregator: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlobError::Network(e.to_string()))?;

        Ok(Self {
            publisher: normalize_endpoint(publisher)?,
            aggregator: normalize_endpoint(aggregator)?,
            client,
            retry: RetryPolicy::none(),
        })
    }

    /// Retry uploads according to `policy`.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Download URL for a content id.
    pub fn blob_url(&self, id: &ContentId) -> String {
        format!("{}/v1/blobs/{}", self.aggregator, id)
    }

    async fn put_once(&self, data: &[u8], options: PutOptions) -> Result<String> {
        let url = format!(
            "{}/v1/blobs?epochs={}&deletable={}",
            self.publisher, options.epochs, options.deletable
        );

        let response = self
            .client
            .put(&url)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| BlobError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::Upload {
                status: status.as_u16(),
            });
        }

        let body: PutResponse = response
            .json()
            .await
            .map_err(|e| BlobError::InvalidResponse(e.to_string()))?;

        body.into_blob_id()
            .ok_or_else(|| BlobError::InvalidResponse("no blob id in publisher response".into()))
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint).map_err(|e| BlobError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Network errors and server-side failures are worth another try.
fn is_transient(err: &BlobError) -> bool {
    match err {
        BlobError::Network(_) => true,
        BlobError::Upload { status } => *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, data: Vec<u8>, options: PutOptions) -> Result<StoredBlob> {
        let mut attempt = 1;
        loop {
            match self.put_once(&data, options).await {
                Ok(blob_id) => {
                    let content_id = ContentId::new(blob_id);
                    debug!(%content_id, size = data.len(), attempt, "blob stored");
                    return Ok(StoredBlob {
                        url: self.blob_url(&content_id),
                        content_id,
                    });
                }
                Err(err) if attempt < self.retry.max_attempts && is_transient(&err) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(attempt, ?delay, error = %err, "blob upload failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get(&self, id: &ContentId) -> Result<Bytes> {
        let response = self
            .client
            .get(self.blob_url(id))
            .send()
            .await
            .map_err(|e| BlobError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::Fetch {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| BlobError::Network(e.to_string()))
    }

    async fn exists(&self, id: &ContentId) -> Result<bool> {
        let response = self
            .client
            .head(self.blob_url(id))
            .send()
            .await
            .map_err(|e| BlobError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}
