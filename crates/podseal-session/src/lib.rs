//! # podseal session
//!
//! Time-boxed, subject-signed session capabilities.
//!
//! A session binds a subject address to one policy program for a fixed TTL.
//! The subject signs a personal message once; the session then carries its
//! own Ed25519 key so every later key-server request is signed without
//! bothering the subject again.
//!
//! ```text
//! PendingSession (Unsigned) --wallet signs--> SessionKey (Signed) --ttl--> Expired
//! ```
//!
//! [`SessionManager`] caches sessions per (subject, policy program) and lets
//! at most one signature request be in flight per key.

pub mod certificate;
pub mod error;
pub mod key;
pub mod manager;
pub mod wallet;

pub use certificate::Certificate;
pub use error::{Result, SessionError, SignerError};
pub use key::{PendingSession, SessionKey, SessionState};
pub use manager::SessionManager;
pub use wallet::{KeypairWallet, PersonalSignature, SubjectWallet};

/// Default session lifetime in minutes.
pub const DEFAULT_TTL_MINUTES: u32 = 10;
