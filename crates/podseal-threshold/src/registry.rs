//! Engine registry: builds the threshold engine once per configuration.
//!
//! Building an engine resolves every key server, so the registry keeps the
//! ready engine and only rebuilds it when the ledger client or any part of
//! the engine configuration changes. Until an engine is ready, [`EngineRegistry::engine`] fails
//! fast with [`ThresholdError::NotInitialized`].

use std::future::Future;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use podseal_core::Clock;
use podseal_ledger::{LedgerId, LedgerOracle};

use crate::engine::{EngineConfig, QuorumEngine, ThresholdEngine};
use crate::error::{Result, ThresholdError};
use crate::server::{KeyServer, KeyServerId};

/// Observable registry state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing built yet.
    Uninitialized,
    /// A build is in progress.
    Initializing,
    /// An engine is ready.
    Ready,
    /// The last build failed.
    Failed(String),
}

/// What an engine was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineKey {
    /// Ledger client identity.
    pub ledger: LedgerId,
    /// Full engine configuration: policy program, weighted servers,
    /// share validation and quorum timeout.
    pub config: EngineConfig,
}

impl EngineKey {
    /// Key-server ids, in configuration order.
    pub fn server_ids(&self) -> Vec<KeyServerId> {
        self.config.server_ids()
    }
}

enum Slot {
    Uninitialized,
    Initializing,
    Ready(Arc<dyn ThresholdEngine>),
    Failed(String),
}

struct Inner {
    key: Option<EngineKey>,
    slot: Slot,
}

/// Holds at most one ready engine.
pub struct EngineRegistry {
    inner: RwLock<Inner>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                key: None,
                slot: Slot::Uninitialized,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        match &self.inner.read().unwrap().slot {
            Slot::Uninitialized => EngineState::Uninitialized,
            Slot::Initializing => EngineState::Initializing,
            Slot::Ready(_) => EngineState::Ready,
            Slot::Failed(reason) => EngineState::Failed(reason.clone()),
        }
    }

    /// Whether an engine is ready.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner.read().unwrap().slot, Slot::Ready(_))
    }

    /// The key the current engine was built for.
    pub fn key(&self) -> Option<EngineKey> {
        self.inner.read().unwrap().key.clone()
    }

    /// The ready engine.
    pub fn engine(&self) -> Result<Arc<dyn ThresholdEngine>> {
        match &self.inner.read().unwrap().slot {
            Slot::Ready(engine) => Ok(engine.clone()),
            _ => Err(ThresholdError::NotInitialized),
        }
    }

    /// Make sure an engine for `key` is ready, building one with `build` if
    /// the key differs from the current one or no engine is ready.
    pub async fn initialize<F, Fut>(&self, key: EngineKey, build: F) -> Result<Arc<dyn ThresholdEngine>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn ThresholdEngine>>>,
    {
        {
            let inner = self.inner.read().unwrap();
            if let (Some(current), Slot::Ready(engine)) = (&inner.key, &inner.slot) {
                if *current == key {
                    debug!(ledger = %key.ledger, "threshold engine already initialized");
                    return Ok(engine.clone());
                }
            }
        }

        {
            let mut inner = self.inner.write().unwrap();
            inner.key = Some(key.clone());
            inner.slot = Slot::Initializing;
        }
        info!(
            ledger = %key.ledger,
            servers = ?key.server_ids(),
            policy = %key.config.policy_program_id,
            verify = ?key.config.verify,
            "initializing threshold engine"
        );

        let built = build().await;

        let mut inner = self.inner.write().unwrap();
        if inner.key.as_ref() != Some(&key) {
            // A newer configuration started while this one was building.
            return built;
        }
        match built {
            Ok(engine) => {
                inner.slot = Slot::Ready(engine.clone());
                info!(ledger = %key.ledger, "threshold engine ready");
                Ok(engine)
            }
            Err(e) => {
                warn!(ledger = %key.ledger, error = %e, "threshold engine initialization failed");
                inner.slot = Slot::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Build a [`QuorumEngine`] for `ledger` and `config`.
    pub async fn initialize_quorum(
        &self,
        ledger: &dyn LedgerOracle,
        config: EngineConfig,
        handles: &[Arc<dyn KeyServer>],
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<dyn ThresholdEngine>> {
        let key = EngineKey {
            ledger: ledger.ledger_id(),
            config: config.clone(),
        };
        self.initialize(key, || async move {
            let engine = QuorumEngine::connect(config, handles, clock).await?;
            Ok(Arc::new(engine) as Arc<dyn ThresholdEngine>)
        })
        .await
    }

    /// Drop the engine.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.key = None;
        inner.slot = Slot::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::CiphertextContainer;
    use crate::engine::{DecryptRequest, EncryptParams, KeyServerConfig, VerifyFlags};
    use podseal_core::ObjectId;
    use std::time::Duration;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullEngine;

    #[async_trait]
    impl ThresholdEngine for NullEngine {
        async fn encrypt(&self, _: &[u8], _: &EncryptParams) -> Result<CiphertextContainer> {
            Err(ThresholdError::Encryption("null".into()))
        }

        async fn decrypt(&self, _: &[u8], _: DecryptRequest<'_>) -> Result<Vec<u8>> {
            Err(ThresholdError::Decryption("null".into()))
        }
    }

    fn key(ledger: &str, servers: &[&str]) -> EngineKey {
        let servers = servers.iter().map(|s| KeyServerConfig::new(*s, 1)).collect();
        EngineKey {
            ledger: LedgerId::new(ledger),
            config: EngineConfig::new(ObjectId::from_bytes([7; 32]), servers),
        }
    }

    async fn init(registry: &EngineRegistry, k: EngineKey, builds: &AtomicUsize) -> Result<Arc<dyn ThresholdEngine>> {
        registry
            .initialize(k, || async move {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(NullEngine) as Arc<dyn ThresholdEngine>)
            })
            .await
    }

    #[test]
    fn test_not_ready_fails_fast() {
        let registry = EngineRegistry::new();
        assert_eq!(registry.state(), EngineState::Uninitialized);
        assert!(matches!(registry.engine(), Err(ThresholdError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_builds_once_per_key() {
        let registry = EngineRegistry::new();
        let builds = AtomicUsize::new(0);

        init(&registry, key("a", &["s1", "s2"]), &builds).await.unwrap();
        init(&registry, key("a", &["s1", "s2"]), &builds).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(registry.is_ready());

        init(&registry, key("a", &["s1", "s3"]), &builds).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);

        init(&registry, key("b", &["s1", "s3"]), &builds).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_any_config_change_rebuilds() {
        let registry = EngineRegistry::new();
        let builds = AtomicUsize::new(0);
        let base = key("a", &["s1", "s2"]);
        init(&registry, base.clone(), &builds).await.unwrap();

        let mut strict = base.clone();
        strict.config = strict.config.with_verify(VerifyFlags::strict());
        init(&registry, strict.clone(), &builds).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(registry.key().unwrap().config.verify, VerifyFlags::strict());

        let mut repointed = strict.clone();
        repointed.config.policy_program_id = ObjectId::from_bytes([8; 32]);
        init(&registry, repointed.clone(), &builds).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 3);

        let mut reweighted = repointed.clone();
        reweighted.config.key_servers[1].weight = 2;
        init(&registry, reweighted.clone(), &builds).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 4);

        let mut slower = reweighted.clone();
        slower.config = slower.config.with_quorum_timeout(Duration::from_secs(5));
        init(&registry, slower.clone(), &builds).await.unwrap();
        init(&registry, slower, &builds).await.unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_failed_build_is_not_ready() {
        let registry = EngineRegistry::new();
        let result = registry
            .initialize(key("a", &["s1"]), || async { Err(ThresholdError::NoKeyServers) })
            .await;

        assert!(result.is_err());
        assert!(matches!(registry.state(), EngineState::Failed(_)));
        assert!(matches!(registry.engine(), Err(ThresholdError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_reset() {
        let registry = EngineRegistry::new();
        let builds = AtomicUsize::new(0);
        init(&registry, key("a", &["s1"]), &builds).await.unwrap();

        registry.reset();
        assert!(!registry.is_ready());
        assert_eq!(registry.key(), None);
    }
}
