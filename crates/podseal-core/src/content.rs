//! Content references.
//!
//! A [`ContentReference`] is assembled from upstream channel metadata and is
//! immutable afterwards. It carries everything the access orchestrator needs
//! to authorize, fetch and decrypt one piece of content.

use serde::{Deserialize, Serialize};

use crate::types::{ContentId, IdentityLabel, ObjectId};

/// Default mime type for episode audio.
pub const DEFAULT_MIME_TYPE: &str = "audio/mpeg";

/// A reference to one encrypted piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    /// Blob store id of the ciphertext.
    pub content_id: ContentId,

    /// Identity label (encryption nonce) the ciphertext is bound to.
    pub encryption_nonce: IdentityLabel,

    /// The policy program that guards decryption.
    pub policy_program_id: ObjectId,

    /// The channel the content is published under.
    pub container_id: ObjectId,

    /// The access right (subscription) the subject claims to hold.
    pub access_right_id: ObjectId,

    /// Declared mime type of the plaintext.
    pub mime_type: String,
}

impl ContentReference {
    /// Create a reference with the default audio mime type.
    pub fn new(
        content_id: ContentId,
        encryption_nonce: IdentityLabel,
        policy_program_id: ObjectId,
        container_id: ObjectId,
        access_right_id: ObjectId,
    ) -> Self {
        Self {
            content_id,
            encryption_nonce,
            policy_program_id,
            container_id,
            access_right_id,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }

    /// Override the declared mime type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}
