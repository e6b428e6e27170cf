//! Error types for podseal core.

use thiserror::Error;

/// Errors produced by core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid hex identifier: {0}")]
    InvalidHex(String),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption error: {0}")]
    DecryptionError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
