//! The self-describing ciphertext container.
//!
//! A container carries everything a decryptor needs to find the key servers:
//! the policy program, the identity label, the threshold and, per server, its
//! weight and the shares wrapped to it. The header is authenticated as
//! associated data of the payload cipher, so it cannot be edited without the
//! payload failing to open.

use serde::{Deserialize, Serialize};

use podseal_core::{Blake3Hash, EncryptionNonce, IdentityLabel, ObjectId};

use crate::error::{Result, ThresholdError};
use crate::server::KeyServerId;
use crate::shamir::Share;
use crate::share::{commitment, WrappedShare};

/// Container format version.
pub const CONTAINER_VERSION: u8 = 1;

/// Shares held by one key server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceShare {
    /// The key server.
    pub server_id: KeyServerId,
    /// Number of shares the server holds.
    pub weight: u8,
    /// Index of the first share; the server holds `first_index..first_index + weight`.
    pub first_index: u8,
    /// One wrapped share per unit of weight.
    pub wrapped: Vec<WrappedShare>,
    /// Commitment per share, in the same order.
    pub commitments: Vec<Blake3Hash>,
}

impl ServiceShare {
    /// Share indexes assigned to this server.
    pub fn index_range(&self) -> std::ops::RangeInclusive<u8> {
        let last = self.first_index.saturating_add(self.weight.saturating_sub(1));
        self.first_index..=last
    }
}

/// Authenticated header; bound to the payload as associated data.
#[derive(Serialize)]
struct Header<'a> {
    version: u8,
    policy_program_id: &'a ObjectId,
    identity_label: &'a IdentityLabel,
    threshold: u8,
    services: Vec<(&'a KeyServerId, u8, u8, &'a [Blake3Hash])>,
}

/// Encrypted content plus the metadata needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextContainer {
    /// Format version.
    pub version: u8,
    /// Policy program gating the key shares.
    pub policy_program_id: ObjectId,
    /// Identity the content is sealed under.
    pub identity_label: IdentityLabel,
    /// Share weight required to decrypt.
    pub threshold: u8,
    /// Per-server share sets, in configuration order.
    pub services: Vec<ServiceShare>,
    /// Nonce for the payload cipher.
    pub payload_nonce: EncryptionNonce,
    /// The encrypted content.
    pub payload: Vec<u8>,
}

impl CiphertextContainer {
    /// `(server, weight)` pairs, in order.
    pub fn service_shares(&self) -> Vec<(KeyServerId, u8)> {
        self.services
            .iter()
            .map(|s| (s.server_id.clone(), s.weight))
            .collect()
    }

    /// Sum of all server weights.
    pub fn total_weight(&self) -> u16 {
        self.services.iter().map(|s| u16::from(s.weight)).sum()
    }

    /// Bytes authenticated alongside the payload.
    pub fn header_bytes(&self) -> Vec<u8> {
        let header = Header {
            version: self.version,
            policy_program_id: &self.policy_program_id,
            identity_label: &self.identity_label,
            threshold: self.threshold,
            services: self
                .services
                .iter()
                .map(|s| (&s.server_id, s.weight, s.first_index, s.commitments.as_slice()))
                .collect(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&header, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Whether `share` matches the commitment recorded for its index.
    pub fn verify_share(&self, share: &Share) -> bool {
        self.services
            .iter()
            .find(|s| s.index_range().contains(&share.index))
            .and_then(|s| {
                s.commitments
                    .get(usize::from(share.index - s.first_index))
            })
            .is_some_and(|expected| {
                *expected == commitment(&self.policy_program_id, &self.identity_label, share)
            })
    }

    /// Check structural invariants after parsing.
    pub fn validate(&self) -> Result<()> {
        if self.version != CONTAINER_VERSION {
            return Err(ThresholdError::MalformedContainer(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.services.is_empty() {
            return Err(ThresholdError::MalformedContainer("no key servers".into()));
        }
        let total = self.total_weight();
        if self.threshold == 0 || u16::from(self.threshold) > total {
            return Err(ThresholdError::InvalidThreshold {
                threshold: self.threshold.into(),
                total,
            });
        }
        for service in &self.services {
            let weight = usize::from(service.weight);
            if weight == 0 || service.wrapped.len() != weight || service.commitments.len() != weight {
                return Err(ThresholdError::MalformedContainer(format!(
                    "inconsistent share set for {}",
                    service.server_id
                )));
            }
        }
        Ok(())
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Parse and validate CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let container: Self = ciborium::from_reader(bytes)
            .map_err(|e| ThresholdError::MalformedContainer(e.to_string()))?;
        container.validate()?;
        Ok(container)
    }
}
