//! Session certificates.
//!
//! A certificate is the public half of a signed session: everything a key
//! server needs to check that the subject really delegated to the session
//! key, for this policy program, and that the delegation is still current.

use serde::{Deserialize, Serialize};

use podseal_core::{Address, Ed25519PublicKey, Ed25519Signature, ObjectId};

use crate::error::{Result, SessionError};

/// The personal message a subject signs to open a session.
pub fn personal_message(
    policy_program_id: &ObjectId,
    ttl_minutes: u32,
    created_at: i64,
    session_key: &Ed25519PublicKey,
) -> Vec<u8> {
    format!(
        "Accessing keys of policy program {} for {} mins from {}, session key {}",
        policy_program_id.to_hex(),
        ttl_minutes,
        created_at,
        session_key.to_hex()
    )
    .into_bytes()
}

/// Signed delegation from a subject to a session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// The subject that signed.
    pub address: Address,
    /// The subject's public key; must derive to `address`.
    pub user_public_key: Ed25519PublicKey,
    /// The key the session signs requests with.
    pub session_public_key: Ed25519PublicKey,
    /// The policy program the session is scoped to.
    pub policy_program_id: ObjectId,
    /// Creation time in Unix milliseconds.
    pub created_at: i64,
    /// Lifetime in minutes.
    pub ttl_minutes: u32,
    /// Subject signature over [`personal_message`].
    pub signature: Ed25519Signature,
}

impl Certificate {
    /// Expiry time in Unix milliseconds.
    pub fn expires_at(&self) -> i64 {
        self.created_at + i64::from(self.ttl_minutes) * 60_000
    }

    /// The message the subject signed.
    pub fn personal_message(&self) -> Vec<u8> {
        personal_message(
            &self.policy_program_id,
            self.ttl_minutes,
            self.created_at,
            &self.session_public_key,
        )
    }

    /// Check key binding, signature and expiry at time `now`.
    pub fn verify(&self, now: i64) -> Result<()> {
        if self.user_public_key.address() != self.address {
            return Err(SessionError::InvalidSignature(
                "public key does not match subject address".into(),
            ));
        }

        self.user_public_key
            .verify(&self.personal_message(), &self.signature)
            .map_err(|e| SessionError::InvalidSignature(e.to_string()))?;

        if now >= self.expires_at() {
            return Err(SessionError::Expired {
                expired_at: self.expires_at(),
            });
        }

        Ok(())
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| SessionError::Malformed(e.to_string()))
    }
}
