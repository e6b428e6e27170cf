//! File configuration.
//!
//! A deployment is described by one TOML file:
//!
//! ```toml
//! [blob]
//! publisher_url = "https://publisher.example.com"
//! aggregator_url = "https://aggregator.example.com"
//!
//! [engine]
//! policy_program_id = "0x…"
//! threshold = 2
//!
//! [[engine.key_servers]]
//! id = "ks-a"
//!
//! [[engine.key_servers]]
//! id = "ks-b"
//! weight = 2
//! ```
//!
//! Endpoint URLs can be overridden from the environment with
//! `PODSEAL_PUBLISHER_URL` and `PODSEAL_AGGREGATOR_URL`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use podseal_blob::{HttpBlobStore, PutOptions, RetryPolicy};
use podseal_core::ObjectId;
use podseal_threshold::{EngineConfig, KeyServerConfig, VerifyFlags};

use crate::context::AccessSettings;
use crate::publish::PublishOptions;

/// Environment variable overriding `blob.publisher_url`.
pub const ENV_PUBLISHER_URL: &str = "PODSEAL_PUBLISHER_URL";
/// Environment variable overriding `blob.aggregator_url`.
pub const ENV_AGGREGATOR_URL: &str = "PODSEAL_AGGREGATOR_URL";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodsealConfig {
    pub blob: BlobConfig,
    pub engine: EngineSection,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

/// Blob store endpoints and upload behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobConfig {
    pub publisher_url: String,
    pub aggregator_url: String,
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    #[serde(default = "default_true")]
    pub deletable: bool,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Upload retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Threshold engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Hex id of the policy program.
    pub policy_program_id: String,
    /// Share weight needed to decrypt newly published content.
    pub threshold: u8,
    pub key_servers: Vec<KeyServerEntry>,
    #[serde(default)]
    pub check_le_encoding: bool,
    #[serde(default)]
    pub check_share_consistency: bool,
    #[serde(default = "default_timeout_ms")]
    pub quorum_timeout_ms: u64,
}

/// One key server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerEntry {
    pub id: String,
    #[serde(default = "default_weight")]
    pub weight: u8,
}

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

/// Access pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_true")]
    pub preflight_lookup: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            preflight_lookup: true,
        }
    }
}

fn default_epochs() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_weight() -> u8 {
    1
}

fn default_ttl_minutes() -> u32 {
    podseal_session::DEFAULT_TTL_MINUTES
}

impl PodsealConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: PodsealConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: PodsealConfig = toml::from_str(&contents)?;
        config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn merge_env(&mut self) {
        self.merge_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`.
    pub fn merge_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_PUBLISHER_URL) {
            self.blob.publisher_url = url;
        }
        if let Some(url) = lookup(ENV_AGGREGATOR_URL) {
            self.blob.aggregator_url = url;
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.key_servers.is_empty() {
            return Err(ConfigError::Invalid("no key servers configured".into()));
        }
        if engine.key_servers.iter().any(|s| s.weight == 0) {
            return Err(ConfigError::Invalid("key server weight must be positive".into()));
        }
        let total: u32 = engine.key_servers.iter().map(|s| u32::from(s.weight)).sum();
        if engine.threshold == 0 || u32::from(engine.threshold) > total {
            return Err(ConfigError::Invalid(format!(
                "threshold {} out of range for total weight {total}",
                engine.threshold
            )));
        }
        if self.session.ttl_minutes == 0 {
            return Err(ConfigError::Invalid("session ttl must be positive".into()));
        }
        self.policy_program_id()?;
        Ok(())
    }

    /// The parsed policy program id.
    pub fn policy_program_id(&self) -> Result<ObjectId, ConfigError> {
        ObjectId::from_hex(&self.engine.policy_program_id)
            .map_err(|e| ConfigError::Invalid(format!("policy_program_id: {e}")))
    }

    /// Upload options.
    pub fn put_options(&self) -> PutOptions {
        PutOptions {
            epochs: self.blob.epochs,
            deletable: self.blob.deletable,
        }
    }

    /// Upload retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.blob.retry.max_attempts,
            Duration::from_millis(self.blob.retry.base_delay_ms),
        )
    }

    /// Blob store request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.blob.request_timeout_ms)
    }

    /// An HTTP blob store for the configured endpoints.
    pub fn http_blob_store(&self) -> Result<HttpBlobStore, ConfigError> {
        let store = HttpBlobStore::new(
            &self.blob.publisher_url,
            &self.blob.aggregator_url,
            self.request_timeout(),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(store.with_retry(self.retry_policy()))
    }

    /// Threshold engine configuration.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let servers = self
            .engine
            .key_servers
            .iter()
            .map(|s| KeyServerConfig::new(s.id.as_str(), s.weight))
            .collect();

        Ok(EngineConfig::new(self.policy_program_id()?, servers)
            .with_verify(VerifyFlags {
                check_le_encoding: self.engine.check_le_encoding,
                check_share_consistency: self.engine.check_share_consistency,
            })
            .with_quorum_timeout(Duration::from_millis(self.engine.quorum_timeout_ms)))
    }

    /// Access pipeline settings.
    pub fn access_settings(&self) -> AccessSettings {
        AccessSettings {
            session_ttl_minutes: self.session.ttl_minutes,
            preflight_lookup: self.access.preflight_lookup,
        }
    }

    /// Publishing options for content of `mime_type`.
    pub fn publish_options(&self, mime_type: impl Into<String>) -> PublishOptions {
        PublishOptions {
            put: self.put_options(),
            threshold: self.engine.threshold,
            mime_type: mime_type.into(),
        }
    }
}
