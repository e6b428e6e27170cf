//! Errors surfaced to callers of the access pipeline.

use thiserror::Error;

use podseal_blob::BlobError;
use podseal_ledger::{DenialReason, LedgerError};
use podseal_session::SessionError;
use podseal_threshold::ThresholdError;

use crate::access::AccessPhase;

/// Why opening or publishing content failed.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The threshold engine is not ready.
    #[error("threshold engine not initialized")]
    NotInitialized,

    /// No subject is connected.
    #[error("no subject connected")]
    NoSubject,

    /// Session negotiation failed, including a declined signature.
    #[error("session creation failed: {0}")]
    Session(SessionError),

    /// The policy program denied access.
    #[error("verification failed: {0}")]
    Verification(DenialReason),

    /// The blob store answered a download with an error status.
    #[error("blob fetch failed with status {status}")]
    BlobFetch { status: u16 },

    /// The blob store could not be reached during a download.
    #[error("blob store error: {0}")]
    Blob(BlobError),

    /// Uploading sealed content failed.
    #[error("blob upload failed: {0}")]
    Upload(BlobError),

    /// Too little key-server weight released shares.
    #[error("insufficient key shares: {collected} of {threshold}")]
    InsufficientShares { collected: u16, threshold: u16 },

    /// The key-server quorum did not answer in time.
    #[error("key-server quorum timed out after {after_ms} ms")]
    QuorumTimeout { after_ms: u64 },

    /// Sealing content failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Opening content failed after shares were gathered.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The ledger could not evaluate the approval transaction.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl AccessError {
    /// Pipeline phase the error belongs to; `None` for publishing errors.
    pub fn phase(&self) -> Option<AccessPhase> {
        match self {
            AccessError::NotInitialized | AccessError::NoSubject => Some(AccessPhase::CheckingInit),
            AccessError::Session(_) => Some(AccessPhase::AwaitingSession),
            AccessError::Verification(_) | AccessError::Ledger(_) => Some(AccessPhase::Preflighting),
            AccessError::BlobFetch { .. } | AccessError::Blob(_) => Some(AccessPhase::Fetching),
            AccessError::InsufficientShares { .. }
            | AccessError::QuorumTimeout { .. }
            | AccessError::Decryption(_) => Some(AccessPhase::Decrypting),
            AccessError::Encryption(_) | AccessError::Upload(_) => None,
        }
    }

    /// Text an end user can act on.
    pub fn user_message(&self) -> String {
        match self {
            AccessError::NotInitialized => {
                "The player is still starting up. Try again in a moment.".into()
            }
            AccessError::NoSubject => "Connect your wallet to play this episode.".into(),
            AccessError::Session(e) if e.is_rejection() => {
                "You declined the signature request. Approve it to unlock this episode.".into()
            }
            AccessError::Session(_) => "Could not start a secure session. Try again.".into(),
            AccessError::Verification(reason) => match reason {
                DenialReason::SubscriptionExpired => {
                    "Your subscription has expired. Renew it to keep listening.".into()
                }
                DenialReason::InvalidChannel => {
                    "Your subscription does not cover this channel.".into()
                }
                DenialReason::ContentNotFound => {
                    "This episode is no longer listed in the channel.".into()
                }
                DenialReason::InvalidNonce => {
                    "This episode's encryption data does not match the channel.".into()
                }
                DenialReason::Unknown(raw) => format!("Access could not be verified: {raw}"),
            },
            AccessError::BlobFetch { status: 404 } => "The episode file could not be found.".into(),
            AccessError::BlobFetch { status } => {
                format!("The episode file could not be downloaded (status {status}).")
            }
            AccessError::Blob(_) => {
                "The storage network could not be reached. Check your connection.".into()
            }
            AccessError::InsufficientShares { .. } => {
                "Not enough key servers approved access. Try again later.".into()
            }
            AccessError::QuorumTimeout { .. } => {
                "Key servers did not respond in time. Try again.".into()
            }
            AccessError::Upload(_) => "The episode could not be uploaded. Try again.".into(),
            AccessError::Encryption(_) => "The episode could not be encrypted.".into(),
            AccessError::Decryption(_) => "The episode could not be decrypted.".into(),
            AccessError::Ledger(_) => "The ledger could not be reached. Try again.".into(),
        }
    }
}

impl From<SessionError> for AccessError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoSubject => AccessError::NoSubject,
            other => AccessError::Session(other),
        }
    }
}

impl From<BlobError> for AccessError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Fetch { status } => AccessError::BlobFetch { status },
            other => AccessError::Blob(other),
        }
    }
}

impl From<ThresholdError> for AccessError {
    fn from(err: ThresholdError) -> Self {
        match err {
            ThresholdError::NotInitialized => AccessError::NotInitialized,
            ThresholdError::InsufficientShares {
                collected,
                threshold,
            } => AccessError::InsufficientShares {
                collected,
                threshold,
            },
            ThresholdError::QuorumTimeout { after_ms } => AccessError::QuorumTimeout { after_ms },
            ThresholdError::Session(e) => AccessError::from(e),
            e @ (ThresholdError::NoKeyServers
            | ThresholdError::InvalidConfig(_)
            | ThresholdError::UnknownKeyServer(_)
            | ThresholdError::InvalidThreshold { .. }
            | ThresholdError::Encryption(_)) => AccessError::Encryption(e.to_string()),
            other => AccessError::Decryption(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podseal_session::SignerError;

    #[test]
    fn test_expired_subscription_message_is_specific() {
        let err = AccessError::Verification(DenialReason::SubscriptionExpired);
        assert!(err.user_message().contains("subscription has expired"));
        assert_eq!(err.phase(), Some(AccessPhase::Preflighting));
    }

    #[test]
    fn test_rejected_signature_message() {
        let err = AccessError::from(SessionError::Signer(SignerError::Rejected));
        assert!(err.user_message().contains("declined"));
        assert_eq!(err.phase(), Some(AccessPhase::AwaitingSession));
    }

    #[test]
    fn test_threshold_errors_keep_their_kind() {
        assert!(matches!(
            AccessError::from(ThresholdError::NotInitialized),
            AccessError::NotInitialized
        ));
        assert!(matches!(
            AccessError::from(ThresholdError::QuorumTimeout { after_ms: 10 }),
            AccessError::QuorumTimeout { after_ms: 10 }
        ));
        assert!(matches!(
            AccessError::from(ThresholdError::NoKeyServers),
            AccessError::Encryption(_)
        ));
        assert!(matches!(
            AccessError::from(ThresholdError::PolicyMismatch),
            AccessError::Decryption(_)
        ));
    }

    #[test]
    fn test_unknown_denial_is_not_prefixed_twice() {
        let err = AccessError::Verification(DenialReason::Unknown("InsufficientGas".into()));
        assert_eq!(err.to_string(), "verification failed: InsufficientGas");
    }

    #[test]
    fn test_upload_errors_have_no_access_phase() {
        let err = AccessError::Upload(BlobError::Upload { status: 500 });
        assert_eq!(err.phase(), None);
        assert!(err.user_message().contains("uploaded"));

        let err = AccessError::from(BlobError::Network("reset".into()));
        assert_eq!(err.phase(), Some(AccessPhase::Fetching));
    }

    #[test]
    fn test_blob_status_is_kept() {
        let err = AccessError::from(BlobError::Fetch { status: 503 });
        assert!(matches!(err, AccessError::BlobFetch { status: 503 }));
        assert!(err.user_message().contains("503"));
    }
}
