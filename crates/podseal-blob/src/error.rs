//! Error types for the blob module.

use thiserror::Error;

/// Errors that can occur during blob transfers.
#[derive(Debug, Error)]
pub enum BlobError {
    /// A download returned a non-success status.
    #[error("blob fetch failed with status {status}")]
    Fetch { status: u16 },

    /// An upload returned a non-success status.
    #[error("blob upload failed with status {status}")]
    Upload { status: u16 },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The store answered with a body we could not interpret.
    #[error("invalid blob store response: {0}")]
    InvalidResponse(String),

    /// A configured endpoint is not a valid URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl BlobError {
    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BlobError::Fetch { status } | BlobError::Upload { status } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for blob operations.
pub type Result<T> = std::result::Result<T, BlobError>;
