//! # podseal threshold
//!
//! Threshold encryption bound to an on-ledger policy.
//!
//! Content is sealed under a policy program and an identity label. The
//! content key is split across independent key servers by weight; a reader
//! gets it back only when servers holding at least `threshold` weight each
//! confirm, by simulating the reader's approval transaction, that the policy
//! allows it.
//!
//! ## Key Types
//!
//! - [`ThresholdEngine`] - The two-operation engine seam
//! - [`QuorumEngine`] - Engine over a fixed key-server set
//! - [`CiphertextContainer`] - Self-describing sealed content
//! - [`KeyServer`] / [`LocalKeyServer`] - Share-holding parties
//! - [`EngineRegistry`] - Ready gate and per-configuration engine cache

pub mod container;
pub mod engine;
pub mod error;
pub mod registry;
pub mod server;
pub mod shamir;
pub mod share;

pub use container::{CiphertextContainer, ServiceShare};
pub use engine::{
    DecryptRequest, EncryptParams, EngineConfig, KeyServerConfig, QuorumEngine, ThresholdEngine,
    VerifyFlags, DEFAULT_QUORUM_TIMEOUT,
};
pub use error::{Result, ThresholdError};
pub use registry::{EngineKey, EngineRegistry, EngineState};
pub use server::{
    request_message, KeyServer, KeyServerId, KeyServerInfo, LocalKeyServer, ShareRequest,
    ShareResponse,
};
pub use share::WrappedShare;
