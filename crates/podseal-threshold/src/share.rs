//! Share wire encoding and wrapping.
//!
//! On the wire a share is `index: u16 (little-endian) || value: [u8; 32]`.
//! Shares travel wrapped: X25519 ECDH with an ephemeral key, a Blake3-derived
//! wrapping key bound to a context, then ChaCha20-Poly1305.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use podseal_core::{
    Blake3Hash, EncryptionNonce, EphemeralKeyPair, IdentityLabel, ObjectId, X25519PublicKey,
    X25519StaticSecret,
};

use crate::error::{Result, ThresholdError};
use crate::server::KeyServerId;
use crate::shamir::{Share, SECRET_LEN};

/// Encoded share length.
pub const SHARE_WIRE_LEN: usize = 2 + SECRET_LEN;

const WRAP_CONTEXT_DOMAIN: &str = "podseal-v1-share-context";
const RESPONSE_CONTEXT_DOMAIN: &str = "podseal-v1-share-response";
const COMMITMENT_DOMAIN: &str = "podseal-v1-share-commitment";

/// Encode a share.
pub fn encode(share: &Share) -> Vec<u8> {
    let mut out = Vec::with_capacity(SHARE_WIRE_LEN);
    out.extend_from_slice(&u16::from(share.index).to_le_bytes());
    out.extend_from_slice(&share.value);
    out
}

/// Decode a share.
///
/// In strict mode the encoding must be exactly [`SHARE_WIRE_LEN`] bytes, the
/// index's high byte must be zero and the index must fall in `expected`.
/// Otherwise only the low index byte is read and trailing bytes are ignored.
pub fn decode(bytes: &[u8], strict: bool, expected: &RangeInclusive<u8>) -> Result<Share> {
    if bytes.len() < SHARE_WIRE_LEN {
        return Err(ThresholdError::MalformedShare(format!(
            "expected {SHARE_WIRE_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let index = if strict {
        if bytes.len() != SHARE_WIRE_LEN {
            return Err(ThresholdError::MalformedShare(format!(
                "expected {SHARE_WIRE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let wide = u16::from_le_bytes([bytes[0], bytes[1]]);
        let index = u8::try_from(wide).map_err(|_| {
            ThresholdError::MalformedShare(format!("share index {wide} out of range"))
        })?;
        if !expected.contains(&index) {
            return Err(ThresholdError::MalformedShare(format!(
                "share index {index} not assigned to this server"
            )));
        }
        index
    } else {
        bytes[0]
    };

    if index == 0 {
        return Err(ThresholdError::MalformedShare("share index 0".into()));
    }

    let mut value = [0u8; SECRET_LEN];
    value.copy_from_slice(&bytes[2..SHARE_WIRE_LEN]);
    Ok(Share { index, value })
}

/// Commitment to a share, stored in the container.
pub fn commitment(policy: &ObjectId, label: &IdentityLabel, share: &Share) -> Blake3Hash {
    Blake3Hash::derive(
        COMMITMENT_DOMAIN,
        &[policy.as_bytes(), label.as_bytes(), &[share.index], &share.value],
    )
}

/// Context binding a share wrapped for a key server.
pub fn wrap_context(
    policy: &ObjectId,
    label: &IdentityLabel,
    server: &KeyServerId,
    position: usize,
) -> Vec<u8> {
    Blake3Hash::derive(
        WRAP_CONTEXT_DOMAIN,
        &[
            policy.as_bytes(),
            label.as_bytes(),
            server.as_str().as_bytes(),
            &(position as u64).to_le_bytes(),
        ],
    )
    .0
    .to_vec()
}

/// Context binding a share re-wrapped for a requesting client.
pub fn response_context(
    response_key: &X25519PublicKey,
    server: &KeyServerId,
    position: usize,
) -> Vec<u8> {
    Blake3Hash::derive(
        RESPONSE_CONTEXT_DOMAIN,
        &[
            response_key.as_bytes(),
            server.as_str().as_bytes(),
            &(position as u64).to_le_bytes(),
        ],
    )
    .0
    .to_vec()
}

/// An encoded share encrypted to one X25519 key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedShare {
    /// Sender's ephemeral public key.
    pub ephemeral_public: X25519PublicKey,
    /// Nonce for the wrapping cipher.
    pub nonce: EncryptionNonce,
    /// The encrypted share encoding.
    pub ciphertext: Vec<u8>,
}

impl WrappedShare {
    /// Encrypt `encoded` to `recipient` under `context`.
    pub fn seal(encoded: &[u8], recipient: &X25519PublicKey, context: &[u8]) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let wrap_key = ephemeral.diffie_hellman(recipient).derive_encryption_key(context);

        let nonce = EncryptionNonce::generate();
        let ciphertext = wrap_key
            .encrypt(encoded, &nonce)
            .map_err(|e| ThresholdError::Encryption(e.to_string()))?;

        Ok(Self {
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the recipient's secret.
    pub fn open(&self, secret: &X25519StaticSecret, context: &[u8]) -> Result<Vec<u8>> {
        let wrap_key = secret
            .diffie_hellman(&self.ephemeral_public)
            .derive_encryption_key(context);

        wrap_key
            .decrypt(&self.ciphertext, &self.nonce)
            .map_err(|e| ThresholdError::Decryption(e.to_string()))
    }
}
