//! The access pipeline end to end on the in-memory ledger.

use podseal::{AccessError, AccessSettings};
use podseal_core::{ContentId, IdentityLabel};
use podseal_ledger::DenialReason;
use podseal_testkit::{init_tracing, TestWorld};

const EPISODE: &[u8] = b"ID3\x04 episode 12: the one about threshold keys";

#[tokio::test]
async fn test_subscriber_opens_episode() {
    init_tracing();
    let world = TestWorld::new(&[1, 1]);
    world.initialize().await.unwrap();

    let published = world.publish(EPISODE, 2).await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);

    let resource = world.open(&reference).await.unwrap();

    assert_eq!(resource.bytes().as_ref(), EPISODE);
    assert_eq!(resource.mime_type(), "audio/mpeg");
    assert_eq!(world.blobs.get_count(), 1);
    assert_eq!(world.share_requests(), 2);
    assert_eq!(world.wallet.signature_requests(), 1);
}

#[tokio::test]
async fn test_not_initialized_touches_nothing() {
    let world = TestWorld::new(&[1]);
    let channel = world.create_channel();
    let subscription = world.ledger.subscribe(channel, world.subscriber(), i64::MAX);
    let reference = podseal_core::ContentReference::new(
        ContentId::new("blob123"),
        IdentityLabel::for_container(&channel),
        world.program,
        channel,
        subscription,
    );

    let err = world.open(&reference).await.unwrap_err();

    assert!(matches!(err, AccessError::NotInitialized));
    assert_eq!(world.wallet.signature_requests(), 0);
    assert_eq!(world.ledger.inspect_count(), 0);
    assert_eq!(world.blobs.get_count(), 0);
}

#[tokio::test]
async fn test_no_subject() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);
    world.wallet.set_connected(false);

    let err = world.open(&reference).await.unwrap_err();

    assert!(matches!(err, AccessError::NoSubject));
    assert_eq!(world.wallet.signature_requests(), 0);
    assert_eq!(world.ledger.inspect_count(), 0);
}

#[tokio::test]
async fn test_session_reused_across_opens() {
    let world = TestWorld::new(&[1, 1]);
    world.initialize().await.unwrap();
    let first = world.publish(EPISODE, 2).await.unwrap();
    let second = world.publish(b"another episode", 2).await.unwrap();
    let a = world.reference_with_subscription(&first, i64::MAX);
    let b = world.reference_with_subscription(&second, i64::MAX);

    world.open(&a).await.unwrap();
    world.open(&b).await.unwrap();
    world.open(&a).await.unwrap();

    assert_eq!(world.wallet.signature_requests(), 1);
}

#[tokio::test]
async fn test_expired_session_is_renegotiated() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);

    world.open(&reference).await.unwrap();
    world.advance_minutes(11);
    let resource = world.open(&reference).await.unwrap();

    assert_eq!(resource.bytes().as_ref(), EPISODE);
    assert_eq!(world.wallet.signature_requests(), 2);
}

#[tokio::test]
async fn test_declined_signature_is_not_cached() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);

    world.wallet.set_rejecting(true);
    let err = world.open(&reference).await.unwrap_err();
    assert!(matches!(&err, AccessError::Session(e) if e.is_rejection()));
    assert_eq!(world.blobs.get_count(), 0);

    world.wallet.set_rejecting(false);
    world.open(&reference).await.unwrap();
    assert_eq!(world.wallet.signature_requests(), 2);
}

#[tokio::test]
async fn test_expired_subscription_stops_before_download() {
    let world = TestWorld::new(&[1, 1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 2).await.unwrap();
    let expires_at = world.now() + 5 * podseal_testkit::MINUTE_MS;
    let reference = world.reference_with_subscription(&published, expires_at);

    world.advance_minutes(6);
    let err = world.open(&reference).await.unwrap_err();

    assert!(matches!(
        err,
        AccessError::Verification(DenialReason::SubscriptionExpired)
    ));
    assert!(err.user_message().contains("subscription has expired"));
    assert_eq!(world.blobs.get_count(), 0);
    assert_eq!(world.share_requests(), 0);
}

#[tokio::test]
async fn test_foreign_channel_subscription_denied() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();

    let other_channel = world.create_channel();
    let wrong = world.ledger.subscribe(other_channel, world.subscriber(), i64::MAX);
    let reference = published.reference(wrong);

    let err = world.open(&reference).await.unwrap_err();
    assert!(matches!(
        err,
        AccessError::Verification(DenialReason::InvalidChannel)
    ));
    assert_eq!(world.blobs.get_count(), 0);
}

#[tokio::test]
async fn test_unlisted_content_fails_lookup() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();
    let mut reference = world.reference_with_subscription(&published, i64::MAX);
    reference.content_id = ContentId::new("never-uploaded");

    let err = world.open(&reference).await.unwrap_err();

    assert!(matches!(
        err,
        AccessError::Verification(DenialReason::ContentNotFound)
    ));
    // Only the lookup reached the ledger.
    assert_eq!(world.ledger.inspect_count(), 1);
    assert_eq!(world.blobs.get_count(), 0);
}

#[tokio::test]
async fn test_unsupported_lookup_is_skipped() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    world.ledger.set_lookup_supported(false);
    let published = world.publish(EPISODE, 1).await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);

    let resource = world.open(&reference).await.unwrap();
    assert_eq!(resource.bytes().as_ref(), EPISODE);
}

#[tokio::test]
async fn test_lookup_can_be_disabled() {
    let world = TestWorld::new(&[1]).with_settings(AccessSettings {
        preflight_lookup: false,
        ..AccessSettings::default()
    });
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();
    let mut reference = world.reference_with_subscription(&published, i64::MAX);
    reference.content_id = ContentId::new("never-uploaded");

    // The approval simulation passes (the label is listed), so the missing
    // blob surfaces at download time instead.
    let err = world.open(&reference).await.unwrap_err();
    assert!(matches!(err, AccessError::BlobFetch { status: 404 }));
    assert_eq!(world.blobs.get_count(), 1);
    assert_eq!(world.share_requests(), 0);
}

#[tokio::test]
async fn test_quorum_floor() {
    let world = TestWorld::new(&[1, 1, 1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 2).await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);

    world.key_servers[0].set_offline(true);
    world.open(&reference).await.unwrap();

    world.key_servers[1].set_offline(true);
    let err = world.open(&reference).await.unwrap_err();
    assert!(matches!(
        err,
        AccessError::InsufficientShares {
            collected: 1,
            threshold: 2
        }
    ));
}

#[tokio::test]
async fn test_reinitializing_same_config_keeps_engine() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();
    world.initialize().await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);

    assert!(world.open(&reference).await.is_ok());
}

#[tokio::test]
async fn test_teardown_requires_reinitialization() {
    let world = TestWorld::new(&[1]);
    world.initialize().await.unwrap();
    let published = world.publish(EPISODE, 1).await.unwrap();
    let reference = world.reference_with_subscription(&published, i64::MAX);
    world.open(&reference).await.unwrap();

    world.access.context().teardown();

    assert!(matches!(
        world.open(&reference).await,
        Err(AccessError::NotInitialized)
    ));
    world.initialize().await.unwrap();
    world.open(&reference).await.unwrap();
    assert_eq!(world.wallet.signature_requests(), 2);
}

#[tokio::test]
async fn test_reinitializing_with_new_config_swaps_engine() {
    let world = TestWorld::new(&[1, 1]);
    world.initialize().await.unwrap();

    let policy = podseal_core::ObjectId::random();
    let mut config = world
        .engine_config()
        .with_verify(podseal_threshold::VerifyFlags::strict());
    config.policy_program_id = policy;
    world.initialize_with(config.clone()).await.unwrap();

    let registry = &world.access.context().registry;
    assert_eq!(registry.key().unwrap().config, config);

    let sealed = registry
        .engine()
        .unwrap()
        .encrypt(
            EPISODE,
            &podseal_threshold::EncryptParams {
                identity_label: IdentityLabel::from_bytes(vec![0xab, 0xcd]),
                threshold: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(sealed.policy_program_id, policy);
}
