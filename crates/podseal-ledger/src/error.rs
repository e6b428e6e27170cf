//! Error types for the ledger module.

use thiserror::Error;

/// Errors that can occur while talking to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger node could not be reached or answered with a transport error.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The ledger answered with something we could not decode.
    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    /// Transaction bytes could not be decoded.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
