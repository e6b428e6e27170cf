//! Key servers.
//!
//! A key server holds one X25519 secret. It only ever sees wrapped shares
//! and only releases them after re-checking the policy itself: it verifies
//! the session certificate and the request signature, confirms the
//! transaction approves exactly the requested identity, and simulates it
//! against the ledger. It never executes anything.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use podseal_core::{
    Blake3Hash, Clock, Ed25519Signature, IdentityLabel, ObjectId, X25519PublicKey,
    X25519StaticSecret,
};
use podseal_ledger::{LedgerOracle, TransactionKind};
use podseal_session::Certificate;

use crate::error::{Result, ThresholdError};
use crate::share::{response_context, wrap_context, WrappedShare};

const REQUEST_DOMAIN: &str = "podseal-v1-share-request";

/// Key server identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyServerId(String);

impl KeyServerId {
    /// Create an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyServerId({})", self.0)
    }
}

impl fmt::Display for KeyServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for KeyServerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Public information about a key server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerInfo {
    /// Server id.
    pub id: KeyServerId,
    /// Key that shares are wrapped to.
    pub public_key: X25519PublicKey,
}

/// What a client presents to get its shares released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRequest {
    /// The subject's session delegation.
    pub certificate: Certificate,
    /// Session-key signature over [`request_message`].
    pub request_signature: Ed25519Signature,
    /// The preflighted approval transaction, kind-only encoding.
    pub tx_kind_bytes: Vec<u8>,
    /// Identity the shares are sealed under.
    pub identity_label: IdentityLabel,
    /// Policy program the container is bound to.
    pub policy_program_id: ObjectId,
    /// This server's shares from the container, in order.
    pub wrapped_shares: Vec<WrappedShare>,
    /// Where released shares should be wrapped to.
    pub response_key: X25519PublicKey,
}

/// A key server's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareResponse {
    /// Shares re-wrapped to the response key, in request order.
    Released(Vec<WrappedShare>),
    /// The server refused.
    Declined { reason: String },
}

/// The message a session key signs for a share request.
pub fn request_message(
    tx_kind_bytes: &[u8],
    response_key: &X25519PublicKey,
    identity_label: &IdentityLabel,
) -> Vec<u8> {
    Blake3Hash::derive(
        REQUEST_DOMAIN,
        &[tx_kind_bytes, response_key.as_bytes(), identity_label.as_bytes()],
    )
    .0
    .to_vec()
}

/// A party holding key shares.
#[async_trait]
pub trait KeyServer: Send + Sync {
    /// This server's id.
    fn id(&self) -> &KeyServerId;

    /// Fetch the server's public information.
    async fn public_info(&self) -> Result<KeyServerInfo>;

    /// Ask the server to release its shares.
    ///
    /// A policy refusal is `Ok(ShareResponse::Declined)`; `Err` means the
    /// server could not be reached or could not evaluate the request.
    async fn fetch_shares(&self, request: ShareRequest) -> Result<ShareResponse>;
}

/// A key server running in-process against a ledger oracle.
pub struct LocalKeyServer {
    id: KeyServerId,
    secret: X25519StaticSecret,
    ledger: Arc<dyn LedgerOracle>,
    clock: Arc<dyn Clock>,
}

impl LocalKeyServer {
    /// Create a server with a fresh secret.
    pub fn new(id: impl Into<KeyServerId>, ledger: Arc<dyn LedgerOracle>, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: id.into(),
            secret: X25519StaticSecret::generate(),
            ledger,
            clock,
        }
    }

    /// The key shares are wrapped to.
    pub fn public_key(&self) -> X25519PublicKey {
        self.secret.public_key()
    }

    fn check_request(&self, request: &ShareRequest) -> std::result::Result<TransactionKind, String> {
        let cert = &request.certificate;
        cert.verify(self.clock.now_millis())
            .map_err(|e| e.to_string())?;

        if cert.policy_program_id != request.policy_program_id {
            return Err("session is scoped to another policy program".into());
        }

        let message = request_message(
            &request.tx_kind_bytes,
            &request.response_key,
            &request.identity_label,
        );
        cert.session_public_key
            .verify(&message, &request.request_signature)
            .map_err(|_| "request not signed by the session key".to_string())?;

        let kind = TransactionKind::from_bytes(&request.tx_kind_bytes).map_err(|e| e.to_string())?;
        if kind.approval_identity(&request.policy_program_id) != Some(request.identity_label.as_bytes()) {
            return Err("transaction does not approve the requested identity".into());
        }

        Ok(kind)
    }
}

#[async_trait]
impl KeyServer for LocalKeyServer {
    fn id(&self) -> &KeyServerId {
        &self.id
    }

    async fn public_info(&self) -> Result<KeyServerInfo> {
        Ok(KeyServerInfo {
            id: self.id.clone(),
            public_key: self.public_key(),
        })
    }

    async fn fetch_shares(&self, request: ShareRequest) -> Result<ShareResponse> {
        let kind = match self.check_request(&request) {
            Ok(kind) => kind,
            Err(reason) => {
                debug!(server = %self.id, %reason, "declining share request");
                return Ok(ShareResponse::Declined { reason });
            }
        };

        let inspect = self
            .ledger
            .dev_inspect(&request.certificate.address, &kind)
            .await
            .map_err(|e| ThresholdError::Unavailable {
                server: self.id.clone(),
                reason: e.to_string(),
            })?;

        if !inspect.success {
            let reason = inspect.error.unwrap_or_else(|| "policy check failed".into());
            debug!(server = %self.id, %reason, "policy denied share request");
            return Ok(ShareResponse::Declined { reason });
        }

        let mut released = Vec::with_capacity(request.wrapped_shares.len());
        for (position, wrapped) in request.wrapped_shares.iter().enumerate() {
            let context = wrap_context(
                &request.policy_program_id,
                &request.identity_label,
                &self.id,
                position,
            );
            let Ok(encoded) = wrapped.open(&self.secret, &context) else {
                return Ok(ShareResponse::Declined {
                    reason: "share not addressed to this server".into(),
                });
            };
            released.push(WrappedShare::seal(
                &encoded,
                &request.response_key,
                &response_context(&request.response_key, &self.id, position),
            )?);
        }

        debug!(server = %self.id, shares = released.len(), "released shares");
        Ok(ShareResponse::Released(released))
    }
}
