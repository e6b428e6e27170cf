//! QuorumEngine end to end against in-process key servers and ledger.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use podseal_core::{Address, Clock, ContentId, ContentReference, IdentityLabel, ManualClock};
use podseal_ledger::{AuthorizationTransaction, LedgerOracle, MemoryLedger};
use podseal_session::{KeypairWallet, SessionKey, SessionManager};
use podseal_threshold::share::{encode, response_context};
use podseal_threshold::shamir::Share;
use podseal_threshold::{
    DecryptRequest, EncryptParams, EngineConfig, KeyServer, KeyServerConfig, KeyServerId,
    KeyServerInfo, LocalKeyServer, QuorumEngine, ShareRequest, ShareResponse, ThresholdEngine,
    ThresholdError, VerifyFlags, WrappedShare,
};

/// Never answers.
struct Hanging(LocalKeyServer);

#[async_trait]
impl KeyServer for Hanging {
    fn id(&self) -> &KeyServerId {
        self.0.id()
    }

    async fn public_info(&self) -> podseal_threshold::Result<KeyServerInfo> {
        self.0.public_info().await
    }

    async fn fetch_shares(&self, _: ShareRequest) -> podseal_threshold::Result<ShareResponse> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!()
    }
}

/// Unreachable.
struct Offline(LocalKeyServer);

#[async_trait]
impl KeyServer for Offline {
    fn id(&self) -> &KeyServerId {
        self.0.id()
    }

    async fn public_info(&self) -> podseal_threshold::Result<KeyServerInfo> {
        self.0.public_info().await
    }

    async fn fetch_shares(&self, _: ShareRequest) -> podseal_threshold::Result<ShareResponse> {
        Err(ThresholdError::Unavailable {
            server: self.0.id().clone(),
            reason: "connection refused".into(),
        })
    }
}

/// Releases a made-up share for index 1, optionally with trailing padding.
struct Forging {
    inner: LocalKeyServer,
    pad: bool,
}

#[async_trait]
impl KeyServer for Forging {
    fn id(&self) -> &KeyServerId {
        self.inner.id()
    }

    async fn public_info(&self) -> podseal_threshold::Result<KeyServerInfo> {
        self.inner.public_info().await
    }

    async fn fetch_shares(&self, request: ShareRequest) -> podseal_threshold::Result<ShareResponse> {
        let mut encoded = encode(&Share {
            index: 1,
            value: rand::random(),
        });
        if self.pad {
            encoded.push(0);
        }
        let wrapped = WrappedShare::seal(
            &encoded,
            &request.response_key,
            &response_context(&request.response_key, self.inner.id(), 0),
        )?;
        Ok(ShareResponse::Released(vec![wrapped]))
    }
}

struct World {
    clock: Arc<ManualClock>,
    ledger: Arc<MemoryLedger>,
    wallet: KeypairWallet,
    sessions: SessionManager,
    reference: ContentReference,
}

impl World {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(1_000));
        let ledger = Arc::new(MemoryLedger::new("memory", clock.clone()));
        let program = ledger.publish_program();
        let creator = Address::from_bytes([1; 32]);
        let channel = ledger.create_channel(creator);
        let label = IdentityLabel::for_container(&channel);
        ledger.add_episode(&creator, &channel, ContentId::new("blob123"), label.clone());

        let wallet = KeypairWallet::generate();
        let subscription = ledger.subscribe(channel, wallet.address(), 1_000 + 3_600_000);
        let reference =
            ContentReference::new(ContentId::new("blob123"), label, program, channel, subscription);

        Self {
            sessions: SessionManager::new(clock.clone()),
            clock,
            ledger,
            wallet,
            reference,
        }
    }

    fn server(&self, id: &str) -> LocalKeyServer {
        LocalKeyServer::new(id, self.ledger.clone() as Arc<dyn LedgerOracle>, self.clock.clone())
    }

    async fn engine(&self, servers: Vec<(Arc<dyn KeyServer>, u8)>, config: impl FnOnce(EngineConfig) -> EngineConfig) -> QuorumEngine {
        let entries = servers
            .iter()
            .map(|(s, w)| KeyServerConfig::new(s.id().clone(), *w))
            .collect();
        let handles: Vec<Arc<dyn KeyServer>> = servers.into_iter().map(|(s, _)| s).collect();
        let config = config(EngineConfig::new(self.reference.policy_program_id, entries));
        QuorumEngine::connect(config, &handles, self.clock.clone() as Arc<dyn Clock>)
            .await
            .unwrap()
    }

    async fn session(&self) -> Arc<SessionKey> {
        self.sessions
            .get_or_create(&self.wallet, &self.reference.policy_program_id, 30)
            .await
            .unwrap()
    }

    fn tx_bytes(&self, reference: &ContentReference) -> Vec<u8> {
        AuthorizationTransaction::build(self.wallet.address(), reference, &reference.access_right_id)
            .kind_bytes()
    }

    async fn seal(&self, engine: &QuorumEngine, plaintext: &[u8], threshold: u8) -> Vec<u8> {
        let params = EncryptParams {
            identity_label: self.reference.encryption_nonce.clone(),
            threshold,
        };
        engine.encrypt(plaintext, &params).await.unwrap().to_bytes()
    }

    async fn open(&self, engine: &QuorumEngine, ciphertext: &[u8]) -> podseal_threshold::Result<Vec<u8>> {
        let session = self.session().await;
        let tx = self.tx_bytes(&self.reference);
        engine
            .decrypt(
                ciphertext,
                DecryptRequest {
                    session: &session,
                    tx_kind_bytes: &tx,
                },
            )
            .await
    }
}

fn local(server: LocalKeyServer) -> Arc<dyn KeyServer> {
    Arc::new(server)
}

#[tokio::test]
async fn test_two_of_two_roundtrip() {
    let world = World::new();
    let engine = world
        .engine(vec![(local(world.server("a")), 1), (local(world.server("b")), 1)], |c| c)
        .await;

    let ciphertext = world.seal(&engine, b"episode audio", 2).await;
    assert_eq!(world.open(&engine, &ciphertext).await.unwrap(), b"episode audio");
}

#[tokio::test]
async fn test_heavy_server_alone_meets_threshold() {
    let world = World::new();
    let engine = world
        .engine(
            vec![
                (local(world.server("heavy")), 2),
                (Arc::new(Offline(world.server("light"))), 1),
            ],
            |c| c.with_verify(VerifyFlags::strict()),
        )
        .await;

    let ciphertext = world.seal(&engine, b"weighted", 2).await;
    assert_eq!(world.open(&engine, &ciphertext).await.unwrap(), b"weighted");
}

#[tokio::test]
async fn test_expired_subscription_gives_insufficient_shares() {
    let world = World::new();
    let engine = world
        .engine(vec![(local(world.server("a")), 1), (local(world.server("b")), 1)], |c| c)
        .await;
    let ciphertext = world.seal(&engine, b"secret", 2).await;

    world.clock.set_millis(1_000 + 3_600_000);
    let err = world.open(&engine, &ciphertext).await.unwrap_err();
    assert!(matches!(
        err,
        ThresholdError::InsufficientShares {
            collected: 0,
            threshold: 2
        }
    ));
}

#[tokio::test]
async fn test_one_unavailable_server_below_threshold() {
    let world = World::new();
    let engine = world
        .engine(
            vec![
                (local(world.server("a")), 1),
                (Arc::new(Offline(world.server("b"))), 1),
            ],
            |c| c,
        )
        .await;
    let ciphertext = world.seal(&engine, b"secret", 2).await;

    let err = world.open(&engine, &ciphertext).await.unwrap_err();
    assert!(matches!(
        err,
        ThresholdError::InsufficientShares {
            collected: 1,
            threshold: 2
        }
    ));
}

#[tokio::test]
async fn test_hanging_server_times_out() {
    let world = World::new();
    let engine = world
        .engine(
            vec![
                (local(world.server("a")), 1),
                (Arc::new(Hanging(world.server("b"))), 1),
            ],
            |c| c.with_quorum_timeout(Duration::from_millis(50)),
        )
        .await;
    let ciphertext = world.seal(&engine, b"secret", 2).await;

    let err = world.open(&engine, &ciphertext).await.unwrap_err();
    assert!(matches!(err, ThresholdError::QuorumTimeout { after_ms: 50 }));
}

#[tokio::test]
async fn test_tx_for_other_identity_is_declined() {
    let world = World::new();
    let engine = world
        .engine(vec![(local(world.server("a")), 1), (local(world.server("b")), 1)], |c| c)
        .await;
    let ciphertext = world.seal(&engine, b"secret", 2).await;

    let mut other = world.reference.clone();
    other.encryption_nonce = IdentityLabel::for_container(&other.container_id);
    world.ledger.add_episode(
        &Address::from_bytes([1; 32]),
        &other.container_id,
        ContentId::new("other"),
        other.encryption_nonce.clone(),
    );

    let session = world.session().await;
    let tx = world.tx_bytes(&other);
    let err = engine
        .decrypt(
            &ciphertext,
            DecryptRequest {
                session: &session,
                tx_kind_bytes: &tx,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ThresholdError::InsufficientShares { .. }));
}

#[tokio::test]
async fn test_forged_share_without_consistency_check_fails_decryption() {
    let world = World::new();
    let forger: Arc<dyn KeyServer> = Arc::new(Forging {
        inner: world.server("a"),
        pad: false,
    });
    let engine = world
        .engine(
            vec![
                (forger, 1),
                (local(world.server("b")), 1),
                (Arc::new(Offline(world.server("c"))), 1),
            ],
            |c| c,
        )
        .await;
    let ciphertext = world.seal(&engine, b"secret", 2).await;

    let err = world.open(&engine, &ciphertext).await.unwrap_err();
    assert!(matches!(err, ThresholdError::Decryption(_)));
}

#[tokio::test]
async fn test_forged_share_with_consistency_check_is_discarded() {
    let world = World::new();
    let forger: Arc<dyn KeyServer> = Arc::new(Forging {
        inner: world.server("a"),
        pad: false,
    });
    let engine = world
        .engine(
            vec![
                (forger, 1),
                (local(world.server("b")), 1),
                (Arc::new(Offline(world.server("c"))), 1),
            ],
            |c| {
                c.with_verify(VerifyFlags {
                    check_le_encoding: false,
                    check_share_consistency: true,
                })
            },
        )
        .await;
    let ciphertext = world.seal(&engine, b"secret", 2).await;

    let err = world.open(&engine, &ciphertext).await.unwrap_err();
    assert!(matches!(
        err,
        ThresholdError::InsufficientShares {
            collected: 1,
            threshold: 2
        }
    ));
}

#[tokio::test]
async fn test_padded_share_rejected_only_in_strict_encoding_mode() {
    for strict in [false, true] {
        let world = World::new();
        let forger: Arc<dyn KeyServer> = Arc::new(Forging {
            inner: world.server("a"),
            pad: true,
        });
        let engine = world
            .engine(
                vec![
                    (forger, 1),
                    (local(world.server("b")), 1),
                    (Arc::new(Offline(world.server("c"))), 1),
                ],
                |c| {
                    c.with_verify(VerifyFlags {
                        check_le_encoding: strict,
                        check_share_consistency: false,
                    })
                },
            )
            .await;
        let ciphertext = world.seal(&engine, b"secret", 2).await;

        let err = world.open(&engine, &ciphertext).await.unwrap_err();
        if strict {
            assert!(matches!(err, ThresholdError::InsufficientShares { .. }));
        } else {
            assert!(matches!(err, ThresholdError::Decryption(_)));
        }
    }
}

#[tokio::test]
async fn test_edited_header_fails_to_open() {
    let world = World::new();
    let engine = world
        .engine(vec![(local(world.server("a")), 1), (local(world.server("b")), 1)], |c| c)
        .await;
    let ciphertext = world.seal(&engine, b"secret", 2).await;

    let mut container = podseal_threshold::CiphertextContainer::from_bytes(&ciphertext).unwrap();
    container.threshold = 1;
    let err = world.open(&engine, &container.to_bytes()).await.unwrap_err();
    assert!(matches!(err, ThresholdError::Decryption(_)));
}

#[tokio::test]
async fn test_session_for_other_policy_is_rejected() {
    let world = World::new();
    let engine = world
        .engine(vec![(local(world.server("a")), 1)], |c| c)
        .await;
    let ciphertext = world.seal(&engine, b"secret", 1).await;

    let other_program = world.ledger.publish_program();
    let session = world
        .sessions
        .get_or_create(&world.wallet, &other_program, 10)
        .await
        .unwrap();
    let tx = world.tx_bytes(&world.reference);
    let err = engine
        .decrypt(
            &ciphertext,
            DecryptRequest {
                session: &session,
                tx_kind_bytes: &tx,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ThresholdError::PolicyMismatch));
}

#[tokio::test]
async fn test_invalid_configurations() {
    let world = World::new();
    let clock = world.clock.clone() as Arc<dyn Clock>;
    let policy = world.reference.policy_program_id;

    let empty = QuorumEngine::connect(EngineConfig::new(policy, vec![]), &[], clock.clone()).await;
    assert!(matches!(empty, Err(ThresholdError::NoKeyServers)));

    let unknown = QuorumEngine::connect(
        EngineConfig::new(policy, vec![KeyServerConfig::new("ghost", 1)]),
        &[],
        clock.clone(),
    )
    .await;
    assert!(matches!(unknown, Err(ThresholdError::UnknownKeyServer(_))));

    let engine = world
        .engine(vec![(local(world.server("a")), 1)], |c| c)
        .await;
    let params = EncryptParams {
        identity_label: world.reference.encryption_nonce.clone(),
        threshold: 2,
    };
    assert!(matches!(
        engine.encrypt(b"x", &params).await,
        Err(ThresholdError::InvalidThreshold {
            threshold: 2,
            total: 1
        })
    ));
}
