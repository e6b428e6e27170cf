//! The subject's wallet: the out-of-band signer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use podseal_core::{Address, Ed25519PublicKey, Ed25519Signature, Keypair};

use crate::error::SignerError;

/// A personal-message signature together with the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonalSignature {
    /// Signature over the message bytes.
    pub signature: Ed25519Signature,
    /// The key that produced it.
    pub public_key: Ed25519PublicKey,
}

/// A connected subject that can sign personal messages.
///
/// `sign_personal_message` may suspend for as long as the subject takes to
/// answer, and may be declined.
#[async_trait]
pub trait SubjectWallet: Send + Sync {
    /// The authenticated subject, if any.
    fn active_address(&self) -> Option<Address>;

    /// Ask the subject to sign `message`.
    async fn sign_personal_message(
        &self,
        message: &[u8],
    ) -> std::result::Result<PersonalSignature, SignerError>;
}

/// A wallet backed by a local Ed25519 keypair.
///
/// Can be disconnected or switched to reject requests, and counts how many
/// signatures were requested.
pub struct KeypairWallet {
    keypair: Keypair,
    connected: AtomicBool,
    rejecting: AtomicBool,
    requests: AtomicUsize,
}

impl KeypairWallet {
    /// Create a connected wallet.
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            connected: AtomicBool::new(true),
            rejecting: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }

    /// Create a wallet with a fresh random key.
    pub fn generate() -> Self {
        Self::new(Keypair::generate())
    }

    /// The wallet's address, whether or not it is connected.
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// Connect or disconnect the wallet.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make subsequent signature requests fail with [`SignerError::Rejected`].
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Number of signature requests received.
    pub fn signature_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubjectWallet for KeypairWallet {
    fn active_address(&self) -> Option<Address> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.keypair.address())
    }

    async fn sign_personal_message(
        &self,
        message: &[u8],
    ) -> std::result::Result<PersonalSignature, SignerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if !self.connected.load(Ordering::SeqCst) {
            return Err(SignerError::Failed("wallet disconnected".into()));
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(SignerError::Rejected);
        }

        Ok(PersonalSignature {
            signature: self.keypair.sign(message),
            public_key: self.keypair.public_key(),
        })
    }
}
