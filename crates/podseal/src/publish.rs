//! Creator-side publishing: seal, then upload.

use std::sync::Arc;

use tracing::info;

use podseal_blob::{BlobStore, PutOptions};
use podseal_core::{ContentId, ContentReference, IdentityLabel, ObjectId};
use podseal_threshold::{EncryptParams, EngineRegistry};

use crate::context::AccessContext;
use crate::error::AccessError;

/// How to seal and store one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Storage options for the ciphertext.
    pub put: PutOptions,
    /// Key-share weight needed to decrypt.
    pub threshold: u8,
    /// MIME type of the plaintext.
    pub mime_type: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            put: PutOptions::default(),
            threshold: 1,
            mime_type: podseal_core::content::DEFAULT_MIME_TYPE.to_string(),
        }
    }
}

/// Result of publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedContent {
    /// Blob store id of the ciphertext.
    pub content_id: ContentId,
    /// Download URL.
    pub url: String,
    /// Identity the content is sealed under; register it with the channel.
    pub identity_label: IdentityLabel,
    /// Policy program guarding the content.
    pub policy_program_id: ObjectId,
    /// The channel.
    pub container_id: ObjectId,
    /// MIME type of the plaintext.
    pub mime_type: String,
}

impl PublishedContent {
    /// The reference a subscriber holding `access_right` uses to open this.
    pub fn reference(&self, access_right: ObjectId) -> ContentReference {
        ContentReference::new(
            self.content_id.clone(),
            self.identity_label.clone(),
            self.policy_program_id,
            self.container_id,
            access_right,
        )
        .with_mime_type(self.mime_type.clone())
    }
}

/// Seals content and uploads it.
pub struct Publisher {
    registry: Arc<EngineRegistry>,
    blobs: Arc<dyn BlobStore>,
}

impl Publisher {
    /// Create a publisher.
    pub fn new(registry: Arc<EngineRegistry>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { registry, blobs }
    }

    /// Share a context's engine and blob store.
    pub fn from_context(ctx: &AccessContext) -> Self {
        Self::new(ctx.registry.clone(), ctx.blobs.clone())
    }

    /// Seal `plaintext` for `container` and upload the ciphertext.
    ///
    /// The identity label is the container id followed by fresh random bytes.
    pub async fn publish(
        &self,
        plaintext: &[u8],
        container: &ObjectId,
        options: &PublishOptions,
    ) -> Result<PublishedContent, AccessError> {
        let engine = self.registry.engine()?;
        let identity_label = IdentityLabel::for_container(container);

        let sealed = engine
            .encrypt(
                plaintext,
                &EncryptParams {
                    identity_label: identity_label.clone(),
                    threshold: options.threshold,
                },
            )
            .await?;
        let stored = self
            .blobs
            .put(sealed.to_bytes(), options.put)
            .await
            .map_err(AccessError::Upload)?;

        info!(
            content_id = %stored.content_id,
            container = %container,
            size = plaintext.len(),
            "published content"
        );

        Ok(PublishedContent {
            content_id: stored.content_id,
            url: stored.url,
            identity_label,
            policy_program_id: sealed.policy_program_id,
            container_id: *container,
            mime_type: options.mime_type.clone(),
        })
    }
}
