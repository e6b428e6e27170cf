//! Error types for the threshold module.

use thiserror::Error;

use crate::server::KeyServerId;

/// Errors that can occur during threshold encryption and decryption.
#[derive(Debug, Error)]
pub enum ThresholdError {
    /// The engine registry has no ready engine.
    #[error("threshold engine not initialized")]
    NotInitialized,

    /// No key servers are configured.
    #[error("no key servers configured")]
    NoKeyServers,

    /// The engine configuration is unusable.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// A configured key server has no handle.
    #[error("unknown key server: {0}")]
    UnknownKeyServer(KeyServerId),

    /// Threshold is zero or above the total weight.
    #[error("invalid threshold {threshold} for total weight {total}")]
    InvalidThreshold { threshold: u16, total: u16 },

    /// The container is bound to another policy program.
    #[error("container is bound to a different policy program")]
    PolicyMismatch,

    /// The session cannot be used for this container.
    #[error("session rejected: {0}")]
    Session(#[from] podseal_session::SessionError),

    /// Not enough key-server weight released shares.
    #[error("insufficient key shares: {collected} of {threshold}")]
    InsufficientShares { collected: u16, threshold: u16 },

    /// The quorum did not answer in time.
    #[error("key-server quorum timed out after {after_ms} ms")]
    QuorumTimeout { after_ms: u64 },

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The ciphertext is not a valid container.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// A share did not decode.
    #[error("malformed share: {0}")]
    MalformedShare(String),

    /// A key server could not be reached.
    #[error("key server {server} unavailable: {reason}")]
    Unavailable { server: KeyServerId, reason: String },

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] podseal_core::CoreError),
}

/// Result type for threshold operations.
pub type Result<T> = std::result::Result<T, ThresholdError>;
