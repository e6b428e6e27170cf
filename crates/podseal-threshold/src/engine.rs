//! The threshold engine.
//!
//! [`ThresholdEngine`] is the pluggable seam with exactly two operations.
//! [`QuorumEngine`] implements it against a fixed set of [`KeyServer`]s:
//! encryption splits a fresh content key across the servers by weight,
//! decryption asks every server the container lists for its shares
//! concurrently and stops as soon as the threshold is met.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use podseal_core::{
    Clock, EncryptionKey, EncryptionNonce, IdentityLabel, ObjectId, X25519PublicKey,
    X25519StaticSecret,
};
use podseal_session::SessionKey;

use crate::container::{CiphertextContainer, ServiceShare, CONTAINER_VERSION};
use crate::error::{Result, ThresholdError};
use crate::server::{request_message, KeyServer, KeyServerId, ShareRequest, ShareResponse};
use crate::shamir::{self, Share};
use crate::share::{self, commitment, response_context, wrap_context, WrappedShare};

/// Default bound on waiting for the key-server quorum.
pub const DEFAULT_QUORUM_TIMEOUT: Duration = Duration::from_secs(30);

/// Optional share validation.
///
/// Both checks are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyFlags {
    /// Require the canonical little-endian share encoding.
    pub check_le_encoding: bool,
    /// Check released shares against the container's commitments and
    /// discard any that do not match.
    pub check_share_consistency: bool,
}

impl VerifyFlags {
    /// Both checks enabled.
    pub fn strict() -> Self {
        Self {
            check_le_encoding: true,
            check_share_consistency: true,
        }
    }
}

/// A configured key server and its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyServerConfig {
    /// Server id.
    pub id: KeyServerId,
    /// Number of shares the server holds.
    pub weight: u8,
}

impl KeyServerConfig {
    /// Create a server entry.
    pub fn new(id: impl Into<KeyServerId>, weight: u8) -> Self {
        Self {
            id: id.into(),
            weight,
        }
    }
}

/// Engine configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Policy program every container is bound to.
    pub policy_program_id: ObjectId,
    /// Key servers, in order.
    pub key_servers: Vec<KeyServerConfig>,
    /// Share validation.
    pub verify: VerifyFlags,
    /// How long decryption waits for the quorum.
    pub quorum_timeout: Duration,
}

impl EngineConfig {
    /// Create a configuration with default validation and timeout.
    pub fn new(policy_program_id: ObjectId, key_servers: Vec<KeyServerConfig>) -> Self {
        Self {
            policy_program_id,
            key_servers,
            verify: VerifyFlags::default(),
            quorum_timeout: DEFAULT_QUORUM_TIMEOUT,
        }
    }

    /// Set the validation flags.
    pub fn with_verify(mut self, verify: VerifyFlags) -> Self {
        self.verify = verify;
        self
    }

    /// Set the quorum timeout.
    pub fn with_quorum_timeout(mut self, timeout: Duration) -> Self {
        self.quorum_timeout = timeout;
        self
    }

    /// Configured server ids, in order.
    pub fn server_ids(&self) -> Vec<KeyServerId> {
        self.key_servers.iter().map(|s| s.id.clone()).collect()
    }

    /// Sum of server weights.
    pub fn total_weight(&self) -> u16 {
        self.key_servers.iter().map(|s| u16::from(s.weight)).sum()
    }
}

/// Encryption parameters.
#[derive(Debug, Clone)]
pub struct EncryptParams {
    /// Identity the content is sealed under.
    pub identity_label: IdentityLabel,
    /// Share weight required to decrypt.
    pub threshold: u8,
}

/// What a decryptor presents.
#[derive(Debug, Clone, Copy)]
pub struct DecryptRequest<'a> {
    /// A signed session for the container's policy program.
    pub session: &'a SessionKey,
    /// The preflighted approval transaction, kind-only encoding.
    pub tx_kind_bytes: &'a [u8],
}

/// Threshold encryption, pluggable.
#[async_trait]
pub trait ThresholdEngine: Send + Sync {
    /// Seal `plaintext` under the configured policy program.
    async fn encrypt(&self, plaintext: &[u8], params: &EncryptParams) -> Result<CiphertextContainer>;

    /// Open a serialized container.
    async fn decrypt(&self, ciphertext: &[u8], request: DecryptRequest<'_>) -> Result<Vec<u8>>;
}

struct ConnectedServer {
    config: KeyServerConfig,
    public_key: X25519PublicKey,
    handle: Arc<dyn KeyServer>,
}

/// Threshold engine over a fixed key-server set.
pub struct QuorumEngine {
    config: EngineConfig,
    servers: Vec<ConnectedServer>,
    clock: Arc<dyn Clock>,
}

impl QuorumEngine {
    /// Resolve every configured server and fetch its public key.
    pub async fn connect(
        config: EngineConfig,
        handles: &[Arc<dyn KeyServer>],
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.key_servers.is_empty() {
            return Err(ThresholdError::NoKeyServers);
        }
        if config.total_weight() > u16::from(u8::MAX) {
            return Err(ThresholdError::InvalidConfig(format!(
                "total weight {} exceeds {}",
                config.total_weight(),
                u8::MAX
            )));
        }

        let mut servers = Vec::with_capacity(config.key_servers.len());
        for (i, entry) in config.key_servers.iter().enumerate() {
            if entry.weight == 0 {
                return Err(ThresholdError::InvalidConfig(format!(
                    "key server {} has zero weight",
                    entry.id
                )));
            }
            if config.key_servers[..i].iter().any(|e| e.id == entry.id) {
                return Err(ThresholdError::InvalidConfig(format!(
                    "duplicate key server {}",
                    entry.id
                )));
            }

            let handle = handles
                .iter()
                .find(|h| h.id() == &entry.id)
                .cloned()
                .ok_or_else(|| ThresholdError::UnknownKeyServer(entry.id.clone()))?;
            let info = handle.public_info().await?;
            if info.id != entry.id {
                return Err(ThresholdError::InvalidConfig(format!(
                    "key server {} reported id {}",
                    entry.id, info.id
                )));
            }

            servers.push(ConnectedServer {
                config: entry.clone(),
                public_key: info.public_key,
                handle,
            });
        }

        Ok(Self {
            config,
            servers,
            clock,
        })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn open_released(
        &self,
        container: &CiphertextContainer,
        service: &KeyServerId,
        range: &std::ops::RangeInclusive<u8>,
        released: &[WrappedShare],
        response_secret: &X25519StaticSecret,
        response_key: &X25519PublicKey,
    ) -> Vec<Share> {
        let verify = self.config.verify;
        released
            .iter()
            .enumerate()
            .filter_map(|(position, wrapped)| {
                let opened = wrapped
                    .open(response_secret, &response_context(response_key, service, position))
                    .and_then(|encoded| share::decode(&encoded, verify.check_le_encoding, range));
                match opened {
                    Ok(share) if verify.check_share_consistency && !container.verify_share(&share) => {
                        debug!(server = %service, index = share.index, "discarding inconsistent share");
                        None
                    }
                    Ok(share) => Some(share),
                    Err(e) => {
                        debug!(server = %service, error = %e, "discarding unreadable share");
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl ThresholdEngine for QuorumEngine {
    async fn encrypt(&self, plaintext: &[u8], params: &EncryptParams) -> Result<CiphertextContainer> {
        let total = self.config.total_weight();
        if params.threshold == 0 || u16::from(params.threshold) > total {
            return Err(ThresholdError::InvalidThreshold {
                threshold: params.threshold.into(),
                total,
            });
        }

        let policy = &self.config.policy_program_id;
        let label = &params.identity_label;
        let key = EncryptionKey::generate();
        // total <= u8::MAX is checked in connect
        let shares = shamir::split(key.as_bytes(), params.threshold, total as u8)?;

        let mut services = Vec::with_capacity(self.servers.len());
        let mut assigned = 0usize;
        for server in &self.servers {
            let weight = usize::from(server.config.weight);
            let slice = &shares[assigned..assigned + weight];
            assigned += weight;

            let wrapped = slice
                .iter()
                .enumerate()
                .map(|(position, s)| {
                    WrappedShare::seal(
                        &share::encode(s),
                        &server.public_key,
                        &wrap_context(policy, label, &server.config.id, position),
                    )
                })
                .collect::<Result<Vec<_>>>()?;

            services.push(ServiceShare {
                server_id: server.config.id.clone(),
                weight: server.config.weight,
                first_index: slice[0].index,
                wrapped,
                commitments: slice.iter().map(|s| commitment(policy, label, s)).collect(),
            });
        }

        let mut container = CiphertextContainer {
            version: CONTAINER_VERSION,
            policy_program_id: *policy,
            identity_label: label.clone(),
            threshold: params.threshold,
            services,
            payload_nonce: EncryptionNonce::generate(),
            payload: Vec::new(),
        };
        container.payload = key
            .encrypt_with_aad(plaintext, &container.header_bytes(), &container.payload_nonce)
            .map_err(|e| ThresholdError::Encryption(e.to_string()))?;

        debug!(threshold = params.threshold, total, size = plaintext.len(), "sealed content");
        Ok(container)
    }

    async fn decrypt(&self, ciphertext: &[u8], request: DecryptRequest<'_>) -> Result<Vec<u8>> {
        let container = CiphertextContainer::from_bytes(ciphertext)?;
        if container.policy_program_id != self.config.policy_program_id
            || request.session.policy_program_id() != container.policy_program_id
        {
            return Err(ThresholdError::PolicyMismatch);
        }
        request.session.ensure_active(self.clock.now_millis())?;

        let threshold = u16::from(container.threshold);
        let targets: Vec<(&ServiceShare, &ConnectedServer)> = container
            .services
            .iter()
            .filter_map(|service| {
                self.servers
                    .iter()
                    .find(|s| s.config.id == service.server_id)
                    .map(|s| (service, s))
            })
            .collect();

        let reachable: u16 = targets.iter().map(|(s, _)| u16::from(s.weight)).sum();
        if reachable < threshold {
            warn!(reachable, threshold, "container lists too few known key servers");
            return Err(ThresholdError::InsufficientShares {
                collected: 0,
                threshold,
            });
        }

        let response_secret = X25519StaticSecret::generate();
        let response_key = response_secret.public_key();
        let request_signature = request.session.sign(&request_message(
            request.tx_kind_bytes,
            &response_key,
            &container.identity_label,
        ));

        let mut pending = JoinSet::new();
        for (service, server) in &targets {
            let share_request = ShareRequest {
                certificate: request.session.certificate().clone(),
                request_signature,
                tx_kind_bytes: request.tx_kind_bytes.to_vec(),
                identity_label: container.identity_label.clone(),
                policy_program_id: container.policy_program_id,
                wrapped_shares: service.wrapped.clone(),
                response_key,
            };
            let handle = server.handle.clone();
            let id = service.server_id.clone();
            let range = service.index_range();
            pending.spawn(async move {
                let outcome = handle.fetch_shares(share_request).await;
                (id, range, outcome)
            });
        }

        let mut collected: BTreeMap<u8, Share> = BTreeMap::new();
        let gather = async {
            while let Some(joined) = pending.join_next().await {
                let (server, range, outcome) = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "key server task failed");
                        continue;
                    }
                };
                match outcome {
                    Ok(ShareResponse::Released(released)) => {
                        let shares = self.open_released(
                            &container,
                            &server,
                            &range,
                            &released,
                            &response_secret,
                            &response_key,
                        );
                        debug!(%server, shares = shares.len(), "key server released shares");
                        for s in shares {
                            collected.insert(s.index, s);
                        }
                    }
                    Ok(ShareResponse::Declined { reason }) => {
                        debug!(%server, %reason, "key server declined");
                    }
                    Err(e) => {
                        warn!(%server, error = %e, "key server unavailable");
                    }
                }
                if collected.len() >= usize::from(threshold) {
                    break;
                }
            }
        };

        if tokio::time::timeout(self.config.quorum_timeout, gather).await.is_err() {
            return Err(ThresholdError::QuorumTimeout {
                after_ms: self.config.quorum_timeout.as_millis() as u64,
            });
        }
        pending.abort_all();

        if collected.len() < usize::from(threshold) {
            return Err(ThresholdError::InsufficientShares {
                collected: collected.len() as u16,
                threshold,
            });
        }

        let selected: Vec<Share> = collected.values().take(usize::from(threshold)).copied().collect();
        let key = EncryptionKey::from_bytes(shamir::combine(&selected)?);
        key.decrypt_with_aad(&container.payload, &container.header_bytes(), &container.payload_nonce)
            .map_err(|e| ThresholdError::Decryption(e.to_string()))
    }
}
