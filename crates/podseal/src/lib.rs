//! # podseal
//!
//! Client-side access to encrypted podcast episodes.
//!
//! Episodes are sealed with a threshold engine bound to the channel's policy
//! program and stored as opaque ciphertext in a blob store. Opening one runs
//! a strictly ordered pipeline:
//!
//! 1. the engine must be initialized and a subject connected
//! 2. a signed session is reused or negotiated
//! 3. the approval transaction is built once and simulated; a denial stops
//!    here, before any download or key-server traffic
//! 4. the ciphertext is fetched
//! 5. the engine decrypts, with key servers re-checking the same transaction
//! 6. the plaintext is handed out as a [`PlayableResource`] that is released
//!    exactly once
//!
//! ## Example
//!
//! ```ignore
//! use podseal::{AccessContext, ContentAccess};
//!
//! let access = ContentAccess::new(context);
//! let resource = access.decrypt_and_open(&reference, &subscription, &wallet).await?;
//! player.load(resource.url(), resource.mime_type());
//! ```

pub mod access;
pub mod config;
pub mod context;
pub mod error;
pub mod publish;
pub mod resource;

pub use access::{AccessPhase, ContentAccess};
pub use config::{ConfigError, PodsealConfig};
pub use context::{AccessContext, AccessSettings};
pub use error::AccessError;
pub use publish::{PublishOptions, PublishedContent, Publisher};
pub use resource::{LoadTicket, PlayableResource, PlayerSlot, ResourceTable};

// Re-export core types for convenience
pub use podseal_core::{Address, ContentId, ContentReference, IdentityLabel, ObjectId};
