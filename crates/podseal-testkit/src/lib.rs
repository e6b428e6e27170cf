//! # podseal testkit
//!
//! Testing utilities for podseal.
//!
//! ## Overview
//!
//! - **Fixtures**: [`TestWorld`] wires a ledger, blob store, key servers, a
//!   wallet and an access context together
//! - **Scripted collaborators**: [`ScriptedLedger`] answers simulations with
//!   canned results; [`CountingKeyServer`] counts share requests and can be
//!   taken offline
//! - **Generators**: proptest strategies for plaintexts and quorum shapes
//!
//! ```rust,ignore
//! use podseal_testkit::TestWorld;
//!
//! let world = TestWorld::new(&[1, 1]);
//! world.initialize().await.unwrap();
//! let published = world.publish(b"episode", 2).await.unwrap();
//! let reference = world.reference_with_subscription(&published, i64::MAX);
//! let resource = world.open(&reference).await.unwrap();
//! ```

pub mod counting;
pub mod fixtures;
pub mod generators;
pub mod scripted;

pub use counting::CountingKeyServer;
pub use fixtures::{TestWorld, MINUTE_MS};
pub use generators::{quorum_shape, QuorumShape};
pub use scripted::ScriptedLedger;

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
