//! The session state machine.
//!
//! [`PendingSession`] is the unsigned request; attaching a valid subject
//! signature consumes it and yields a [`SessionKey`]. A `SessionKey` is never
//! mutated afterwards; it simply reads as expired once its TTL has passed.

use std::fmt;

use podseal_core::{Address, Ed25519PublicKey, Ed25519Signature, Keypair, ObjectId};

use crate::certificate::{personal_message, Certificate};
use crate::error::{Result, SessionError};
use crate::wallet::PersonalSignature;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, waiting for the subject's signature.
    Unsigned,
    /// Signed and within its TTL.
    Signed,
    /// Signed but past its TTL.
    Expired,
}

/// A session waiting for the subject's signature.
pub struct PendingSession {
    address: Address,
    policy_program_id: ObjectId,
    created_at: i64,
    ttl_minutes: u32,
    session_keypair: Keypair,
}

impl PendingSession {
    /// Start a session for `address` on `policy_program_id`.
    pub fn new(
        address: Address,
        policy_program_id: ObjectId,
        ttl_minutes: u32,
        now: i64,
    ) -> Result<Self> {
        if ttl_minutes == 0 {
            return Err(SessionError::InvalidTtl(ttl_minutes));
        }

        Ok(Self {
            address,
            policy_program_id,
            created_at: now,
            ttl_minutes,
            session_keypair: Keypair::generate(),
        })
    }

    /// Always [`SessionState::Unsigned`].
    pub fn state(&self) -> SessionState {
        SessionState::Unsigned
    }

    /// The challenge the subject must sign.
    pub fn personal_message(&self) -> Vec<u8> {
        personal_message(
            &self.policy_program_id,
            self.ttl_minutes,
            self.created_at,
            &self.session_keypair.public_key(),
        )
    }

    /// Attach the subject's signature.
    ///
    /// Fails if the signing key does not control the session's address or
    /// the signature does not cover [`Self::personal_message`].
    pub fn attach(self, signed: PersonalSignature) -> Result<SessionKey> {
        let certificate = Certificate {
            address: self.address,
            user_public_key: signed.public_key,
            session_public_key: self.session_keypair.public_key(),
            policy_program_id: self.policy_program_id,
            created_at: self.created_at,
            ttl_minutes: self.ttl_minutes,
            signature: signed.signature,
        };

        if certificate.user_public_key.address() != self.address {
            return Err(SessionError::InvalidSignature(
                "signed by a different subject".into(),
            ));
        }
        certificate
            .user_public_key
            .verify(&certificate.personal_message(), &certificate.signature)
            .map_err(|e| SessionError::InvalidSignature(e.to_string()))?;

        Ok(SessionKey {
            certificate,
            session_keypair: self.session_keypair,
        })
    }
}

/// A signed session.
pub struct SessionKey {
    certificate: Certificate,
    session_keypair: Keypair,
}

impl SessionKey {
    /// The subject this session acts for.
    pub fn address(&self) -> Address {
        self.certificate.address
    }

    /// The policy program this session is scoped to.
    pub fn policy_program_id(&self) -> ObjectId {
        self.certificate.policy_program_id
    }

    /// Creation time in Unix milliseconds.
    pub fn created_at(&self) -> i64 {
        self.certificate.created_at
    }

    /// Expiry time in Unix milliseconds.
    pub fn expires_at(&self) -> i64 {
        self.certificate.expires_at()
    }

    /// Whether the session has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    /// State at `now`.
    pub fn state(&self, now: i64) -> SessionState {
        if self.is_expired(now) {
            SessionState::Expired
        } else {
            SessionState::Signed
        }
    }

    /// Fail with [`SessionError::Expired`] unless usable at `now`.
    pub fn ensure_active(&self, now: i64) -> Result<()> {
        if self.is_expired(now) {
            return Err(SessionError::Expired {
                expired_at: self.expires_at(),
            });
        }
        Ok(())
    }

    /// The certificate presented to key servers.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The session's own public key.
    pub fn session_public_key(&self) -> Ed25519PublicKey {
        self.session_keypair.public_key()
    }

    /// Sign a request with the session key.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.session_keypair.sign(message)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.certificate.address)
            .field("policy_program_id", &self.certificate.policy_program_id)
            .field("expires_at", &self.expires_at())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_with(keypair: &Keypair, pending: &PendingSession) -> PersonalSignature {
        PersonalSignature {
            signature: keypair.sign(&pending.personal_message()),
            public_key: keypair.public_key(),
        }
    }

    #[test]
    fn test_sign_and_expire() {
        let subject = Keypair::from_seed(&[1; 32]);
        let policy = ObjectId::from_bytes([7; 32]);
        let pending = PendingSession::new(subject.address(), policy, 10, 1_000).unwrap();
        assert_eq!(pending.state(), SessionState::Unsigned);

        let signature = sign_with(&subject, &pending);
        let session = pending.attach(signature).unwrap();

        assert_eq!(session.expires_at(), 1_000 + 10 * 60_000);
        assert_eq!(session.state(1_000), SessionState::Signed);
        assert_eq!(session.state(session.expires_at() - 1), SessionState::Signed);
        assert_eq!(session.state(session.expires_at()), SessionState::Expired);
        assert!(session.ensure_active(session.expires_at()).is_err());
    }

    #[test]
    fn test_certificate_verifies() {
        let subject = Keypair::from_seed(&[1; 32]);
        let pending =
            PendingSession::new(subject.address(), ObjectId::from_bytes([7; 32]), 5, 0).unwrap();
        let signature = sign_with(&subject, &pending);
        let session = pending.attach(signature).unwrap();

        let cert = Certificate::from_bytes(&session.certificate().to_bytes()).unwrap();
        assert!(cert.verify(0).is_ok());
        assert!(matches!(
            cert.verify(5 * 60_000),
            Err(SessionError::Expired { .. })
        ));
    }

    #[test]
    fn test_tampered_certificate_fails() {
        let subject = Keypair::from_seed(&[1; 32]);
        let pending =
            PendingSession::new(subject.address(), ObjectId::from_bytes([7; 32]), 5, 0).unwrap();
        let signature = sign_with(&subject, &pending);
        let session = pending.attach(signature).unwrap();

        let mut cert = session.certificate().clone();
        cert.ttl_minutes = 500;
        assert!(matches!(
            cert.verify(0),
            Err(SessionError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_signature_from_other_subject_is_rejected() {
        let subject = Keypair::from_seed(&[1; 32]);
        let impostor = Keypair::from_seed(&[2; 32]);
        let pending =
            PendingSession::new(subject.address(), ObjectId::from_bytes([7; 32]), 5, 0).unwrap();

        let signature = sign_with(&impostor, &pending);
        assert!(matches!(
            pending.attach(signature),
            Err(SessionError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = PendingSession::new(Address::ZERO, ObjectId::from_bytes([7; 32]), 0, 0);
        assert!(matches!(result, Err(SessionError::InvalidTtl(0))));
    }
}
