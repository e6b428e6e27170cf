//! The access context: every shared collaborator in one owned value.
//!
//! The engine registry, the session cache and the resource table live here
//! rather than in globals, so two contexts (two apps, two tests) never see
//! each other's state.

use std::sync::Arc;

use podseal_blob::BlobStore;
use podseal_core::Clock;
use podseal_ledger::LedgerOracle;
use podseal_session::{SessionManager, DEFAULT_TTL_MINUTES};
use podseal_threshold::{EngineConfig, EngineRegistry, KeyServer};

use crate::error::AccessError;
use crate::resource::ResourceTable;

/// Tunables for the access pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessSettings {
    /// Lifetime of newly negotiated sessions.
    pub session_ttl_minutes: u32,
    /// Run the content lookup before the approval simulation.
    pub preflight_lookup: bool,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            session_ttl_minutes: DEFAULT_TTL_MINUTES,
            preflight_lookup: true,
        }
    }
}

/// Shared state for content access.
pub struct AccessContext {
    /// Threshold engine, built once per configuration.
    pub registry: Arc<EngineRegistry>,
    /// Session cache.
    pub sessions: Arc<SessionManager>,
    /// Ledger used for lookups and preflight simulation.
    pub ledger: Arc<dyn LedgerOracle>,
    /// Ciphertext storage.
    pub blobs: Arc<dyn BlobStore>,
    /// Live playable resources.
    pub resources: Arc<ResourceTable>,
    /// Pipeline settings.
    pub settings: AccessSettings,
    clock: Arc<dyn Clock>,
}

impl AccessContext {
    /// Create a context with an empty registry, session cache and resource table.
    pub fn new(ledger: Arc<dyn LedgerOracle>, blobs: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Arc::new(EngineRegistry::new()),
            sessions: Arc::new(SessionManager::new(clock.clone())),
            ledger,
            blobs,
            resources: ResourceTable::new(),
            settings: AccessSettings::default(),
            clock,
        }
    }

    /// Replace the pipeline settings.
    pub fn with_settings(mut self, settings: AccessSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The context's clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Build (or keep) the threshold engine for `config`.
    pub async fn initialize_engine(
        &self,
        config: EngineConfig,
        key_servers: &[Arc<dyn KeyServer>],
    ) -> Result<(), AccessError> {
        self.registry
            .initialize_quorum(self.ledger.as_ref(), config, key_servers, self.clock.clone())
            .await?;
        Ok(())
    }

    /// Forget every session and the engine.
    pub fn teardown(&self) {
        self.sessions.clear();
        self.registry.reset();
    }
}
