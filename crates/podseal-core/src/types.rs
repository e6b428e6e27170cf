//! Strong type definitions for podseal.
//!
//! All identifiers are newtypes so a subscription id can never be passed
//! where a channel id is expected by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

fn decode_hex32(s: &str) -> Result<[u8; 32]> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| CoreError::InvalidHex(format!("expected 32 bytes, got {}", v.len())))
}

/// A 32-byte subject address.
///
/// Addresses are derived from the subject's Ed25519 public key, see
/// [`crate::Ed25519PublicKey::address`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        decode_hex32(s).map(Self)
    }

    /// The zero address.
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A 32-byte ledger object identifier.
///
/// Used for policy programs, channels (containers) and subscriptions
/// (access rights).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub [u8; 32]);

impl ObjectId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self> {
        decode_hex32(s).map(Self)
    }

    /// Generate a random object id.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Opaque blob identifier assigned by the blob store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Wrap a blob id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The identity a ciphertext is bound to (the "encryption nonce").
///
/// For channel content the label is the channel id followed by a few random
/// bytes, so the policy program can check that a label belongs to a channel.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityLabel(pub Vec<u8>);

/// Number of random bytes appended to the container id by [`IdentityLabel::for_container`].
pub const LABEL_SUFFIX_LEN: usize = 5;

impl IdentityLabel {
    /// Wrap raw label bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Derive a fresh label scoped to a container.
    pub fn for_container(container: &ObjectId) -> Self {
        use rand::RngCore;
        let mut suffix = [0u8; LABEL_SUFFIX_LEN];
        rand::thread_rng().fill_bytes(&mut suffix);
        let mut bytes = container.as_bytes().to_vec();
        bytes.extend_from_slice(&suffix);
        Self(bytes)
    }

    /// Whether this label is prefixed by the given container id.
    pub fn belongs_to(&self, container: &ObjectId) -> bool {
        self.0.starts_with(container.as_bytes())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(trimmed)
            .map(Self)
            .map_err(|e| CoreError::InvalidHex(e.to_string()))
    }
}

impl fmt::Debug for IdentityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityLabel({})", self.to_hex())
    }
}

impl AsRef<[u8]> for IdentityLabel {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
