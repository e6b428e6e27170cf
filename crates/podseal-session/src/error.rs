//! Error types for the session module.

use thiserror::Error;

/// Why a wallet did not produce a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The subject declined the request.
    #[error("signature request rejected by the user")]
    Rejected,

    /// The wallet failed for another reason.
    #[error("signing failed: {0}")]
    Failed(String),
}

/// Errors that can occur while creating or using a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No subject is connected.
    #[error("no subject address available")]
    NoSubject,

    /// The wallet did not sign the session message.
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// The returned signature does not authorize this session.
    #[error("invalid session signature: {0}")]
    InvalidSignature(String),

    /// The session is past its expiry.
    #[error("session expired at {expired_at}")]
    Expired { expired_at: i64 },

    /// TTL must be at least one minute.
    #[error("invalid session ttl: {0} minutes")]
    InvalidTtl(u32),

    /// A certificate failed to parse.
    #[error("malformed certificate: {0}")]
    Malformed(String),
}

impl SessionError {
    /// Whether the subject explicitly declined to sign.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SessionError::Signer(SignerError::Rejected))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
