//! Test fixtures.
//!
//! A [`TestWorld`] is one deployment in a box: a ledger, an in-memory blob
//! store, weighted key servers judging against the same ledger, one
//! connected subscriber and an access context over all of it.

use std::sync::Arc;

use podseal::{AccessContext, AccessError, AccessSettings, ContentAccess, PlayableResource, PublishOptions, PublishedContent, Publisher};
use podseal_blob::{BlobStore, MemoryBlobStore};
use podseal_core::{Address, Clock, ContentReference, Keypair, ManualClock, ObjectId};
use podseal_ledger::{LedgerOracle, MemoryLedger};
use podseal_session::KeypairWallet;
use podseal_threshold::{EngineConfig, KeyServer, KeyServerConfig, LocalKeyServer};

use crate::counting::CountingKeyServer;

/// One minute in clock milliseconds.
pub const MINUTE_MS: i64 = 60_000;

/// Clock start for every world.
const START_MS: i64 = 1_700_000_000_000;

/// A wired-up deployment.
pub struct TestWorld<L: LedgerOracle + 'static = MemoryLedger> {
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<L>,
    pub blobs: Arc<MemoryBlobStore>,
    pub key_servers: Vec<Arc<CountingKeyServer>>,
    pub program: ObjectId,
    /// Owner of every channel the world creates.
    pub creator: Address,
    pub wallet: Arc<KeypairWallet>,
    pub access: ContentAccess,
    pub publisher: Publisher,
    weights: Vec<u8>,
}

impl TestWorld<MemoryLedger> {
    /// A world on a [`MemoryLedger`] with one key server per weight.
    pub fn new(weights: &[u8]) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let ledger = Arc::new(MemoryLedger::new("memory", clock.clone()));
        let program = ledger.publish_program();
        Self::assemble(clock, ledger, program, weights)
    }

    /// Create a channel owned by the world's creator.
    pub fn create_channel(&self) -> ObjectId {
        self.ledger.create_channel(self.creator)
    }

    /// Publish `plaintext` into `channel` and list it there.
    pub async fn publish_into(
        &self,
        channel: &ObjectId,
        plaintext: &[u8],
        threshold: u8,
    ) -> Result<PublishedContent, AccessError> {
        let options = PublishOptions {
            threshold,
            ..PublishOptions::default()
        };
        let published = self.publisher.publish(plaintext, channel, &options).await?;
        self.ledger.add_episode(
            &self.creator,
            channel,
            published.content_id.clone(),
            published.identity_label.clone(),
        );
        Ok(published)
    }

    /// Publish into a new channel.
    pub async fn publish(&self, plaintext: &[u8], threshold: u8) -> Result<PublishedContent, AccessError> {
        let channel = self.create_channel();
        self.publish_into(&channel, plaintext, threshold).await
    }

    /// Subscribe the world's wallet to the channel of `published` and return
    /// a reference that claims the subscription.
    pub fn reference_with_subscription(&self, published: &PublishedContent, expires_at: i64) -> ContentReference {
        let subscription = self
            .ledger
            .subscribe(published.container_id, self.subscriber(), expires_at);
        published.reference(subscription)
    }
}

impl<L: LedgerOracle + 'static> TestWorld<L> {
    /// A world on a caller-provided ledger.
    pub fn with_ledger(ledger: Arc<L>, program: ObjectId, weights: &[u8]) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        Self::assemble(clock, ledger, program, weights)
    }

    fn assemble(clock: Arc<ManualClock>, ledger: Arc<L>, program: ObjectId, weights: &[u8]) -> Self {
        let dyn_ledger: Arc<dyn LedgerOracle> = ledger.clone();
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let key_servers = (0..weights.len())
            .map(|i| {
                let server = LocalKeyServer::new(format!("ks-{i}"), dyn_ledger.clone(), dyn_clock.clone());
                Arc::new(CountingKeyServer::new(server))
            })
            .collect();

        let blobs = Arc::new(MemoryBlobStore::new());
        let ctx = AccessContext::new(dyn_ledger, blobs.clone() as Arc<dyn BlobStore>, dyn_clock);
        let publisher = Publisher::from_context(&ctx);

        Self {
            clock,
            ledger,
            blobs,
            key_servers,
            program,
            creator: Keypair::generate().address(),
            wallet: Arc::new(KeypairWallet::generate()),
            access: ContentAccess::new(ctx),
            publisher,
            weights: weights.to_vec(),
        }
    }

    /// Replace the access settings. Call before opening anything.
    pub fn with_settings(mut self, settings: AccessSettings) -> Self {
        let ctx = self.access.context();
        let replacement = AccessContext::new(
            ctx.ledger.clone(),
            ctx.blobs.clone(),
            ctx.clock().clone(),
        )
        .with_settings(settings);
        self.publisher = Publisher::from_context(&replacement);
        self.access = ContentAccess::new(replacement);
        self
    }

    /// The subscriber's address.
    pub fn subscriber(&self) -> Address {
        self.wallet.address()
    }

    /// Engine configuration for the world's program and key servers.
    pub fn engine_config(&self) -> EngineConfig {
        let servers = self
            .key_servers
            .iter()
            .zip(&self.weights)
            .map(|(server, weight)| KeyServerConfig::new(server.id().clone(), *weight))
            .collect();
        EngineConfig::new(self.program, servers)
    }

    /// Initialize the threshold engine with [`TestWorld::engine_config`].
    pub async fn initialize(&self) -> Result<(), AccessError> {
        self.initialize_with(self.engine_config()).await
    }

    pub async fn initialize_with(&self, config: EngineConfig) -> Result<(), AccessError> {
        let handles: Vec<Arc<dyn KeyServer>> = self
            .key_servers
            .iter()
            .map(|s| s.clone() as Arc<dyn KeyServer>)
            .collect();
        self.access.context().initialize_engine(config, &handles).await
    }

    /// Open `reference` with the world's wallet.
    pub async fn open(&self, reference: &ContentReference) -> Result<PlayableResource, AccessError> {
        self.access
            .decrypt_and_open(reference, &reference.access_right_id, self.wallet.as_ref())
            .await
    }

    /// Share requests across all key servers.
    pub fn share_requests(&self) -> usize {
        self.key_servers.iter().map(|s| s.fetch_count()).sum()
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance_millis(minutes * MINUTE_MS);
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}
