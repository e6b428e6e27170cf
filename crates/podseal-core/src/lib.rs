//! # podseal core
//!
//! Pure primitives shared by every podseal crate: strongly typed identifiers,
//! the [`ContentReference`] handed to the access orchestrator, key material
//! wrappers and an injectable [`Clock`].
//!
//! This crate does no I/O. Ledger calls, blob transfers and key-server
//! queries live in the crates layered on top of it.
//!
//! ## Key Types
//!
//! - [`Address`] - A subject (wallet account) address, derived from an Ed25519 key
//! - [`ObjectId`] - A ledger object: policy program, channel or subscription
//! - [`ContentId`] - Opaque blob identifier assigned by the blob store
//! - [`IdentityLabel`] - The encryption nonce a ciphertext is bound to
//! - [`ContentReference`] - Everything needed to locate and authorize one episode

pub mod clock;
pub mod content;
pub mod crypto;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content::ContentReference;
pub use crypto::{
    Blake3Hash, Ed25519PublicKey, Ed25519Signature, EncryptionKey, EncryptionNonce,
    EphemeralKeyPair, Keypair, SharedKey, X25519PublicKey, X25519StaticSecret,
};
pub use error::{CoreError, Result};
pub use types::{Address, ContentId, IdentityLabel, ObjectId};
