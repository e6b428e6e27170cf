//! In-memory ledger with a subscription policy program.
//!
//! This is primarily for tests and local development. It models the policy
//! program the podcast platform deploys: channels list episodes by identity
//! label, subscriptions grant a subscriber time-limited access to one
//! channel, and `seal_approve` aborts with the codes in
//! [`crate::policy::abort_codes`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use podseal_core::{Address, Clock, ContentId, IdentityLabel, ObjectId};

use crate::error::Result;
use crate::lookup::encode_content_ids;
use crate::oracle::{InspectResult, LedgerId, LedgerOracle};
use crate::policy::{abort_codes, format_abort};
use crate::transaction::{CallArg, MoveCall, TransactionKind, APPROVE_FUNCTION, LOOKUP_FUNCTION};

/// An episode registered under a channel.
#[derive(Debug, Clone)]
struct Episode {
    content_id: ContentId,
    label: IdentityLabel,
}

/// A channel object.
#[derive(Debug, Clone)]
struct Channel {
    owner: Address,
    episodes: Vec<Episode>,
}

/// A subscription object.
#[derive(Debug, Clone)]
struct Subscription {
    channel: ObjectId,
    subscriber: Address,
    expires_at: i64,
}

#[derive(Default)]
struct LedgerState {
    programs: HashSet<ObjectId>,
    channels: HashMap<ObjectId, Channel>,
    subscriptions: HashMap<ObjectId, Subscription>,
}

/// In-memory ledger oracle.
///
/// Thread-safe via RwLock. Counts `dev_inspect` calls so tests can assert
/// which steps reached the ledger.
pub struct MemoryLedger {
    id: LedgerId,
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
    lookup_supported: AtomicBool,
    inspect_calls: AtomicUsize,
}

impl MemoryLedger {
    /// Create an empty ledger reading time from `clock`.
    pub fn new(id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: LedgerId::new(id),
            clock,
            state: RwLock::new(LedgerState::default()),
            lookup_supported: AtomicBool::new(true),
            inspect_calls: AtomicUsize::new(0),
        }
    }

    /// Publish a policy program and return its id.
    pub fn publish_program(&self) -> ObjectId {
        let id = ObjectId::random();
        self.state.write().unwrap().programs.insert(id);
        id
    }

    /// Create a channel owned by `owner`.
    pub fn create_channel(&self, owner: Address) -> ObjectId {
        let id = ObjectId::random();
        self.state.write().unwrap().channels.insert(
            id,
            Channel {
                owner,
                episodes: Vec::new(),
            },
        );
        id
    }

    /// Register an episode under a channel on behalf of `creator`.
    ///
    /// Returns false if the channel does not exist or `creator` does not own it.
    pub fn add_episode(
        &self,
        creator: &Address,
        channel: &ObjectId,
        content_id: ContentId,
        label: IdentityLabel,
    ) -> bool {
        let mut state = self.state.write().unwrap();
        match state.channels.get_mut(channel) {
            Some(ch) if ch.owner == *creator => {
                ch.episodes.push(Episode { content_id, label });
                true
            }
            Some(_) => {
                tracing::debug!(%channel, %creator, "episode rejected: not the channel owner");
                false
            }
            None => false,
        }
    }

    /// Issue a subscription to `channel` for `subscriber`, valid until `expires_at`.
    pub fn subscribe(&self, channel: ObjectId, subscriber: Address, expires_at: i64) -> ObjectId {
        let id = ObjectId::random();
        self.state.write().unwrap().subscriptions.insert(
            id,
            Subscription {
                channel,
                subscriber,
                expires_at,
            },
        );
        id
    }

    /// Toggle support for the content lookup function.
    pub fn set_lookup_supported(&self, supported: bool) {
        self.lookup_supported.store(supported, Ordering::SeqCst);
    }

    /// Number of `dev_inspect` calls served so far.
    pub fn inspect_count(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    fn seal_approve(&self, sender: &Address, call: &MoveCall) -> InspectResult {
        let abort = |code| {
            InspectResult::failed(format_abort(
                &call.package.to_hex(),
                &call.module,
                &call.function,
                code,
            ))
        };

        let (label, subscription_id, channel_id) = match call.arguments.as_slice() {
            [CallArg::Pure(label), CallArg::Object(sub), CallArg::Object(channel)] => {
                (IdentityLabel::from_bytes(label.clone()), sub, channel)
            }
            _ => return InspectResult::failed("InvalidArguments: expected (vector<u8>, Subscription, Channel)"),
        };

        let state = self.state.read().unwrap();

        let Some(subscription) = state.subscriptions.get(subscription_id) else {
            return InspectResult::failed(format!("ObjectNotFound: {subscription_id}"));
        };
        let Some(channel) = state.channels.get(channel_id) else {
            return InspectResult::failed(format!("ObjectNotFound: {channel_id}"));
        };

        if &subscription.subscriber != sender {
            return abort(abort_codes::E_NO_ACCESS);
        }
        if &subscription.channel != channel_id {
            return abort(abort_codes::E_INVALID_CHANNEL);
        }
        if self.clock.now_millis() >= subscription.expires_at {
            return abort(abort_codes::E_SUBSCRIPTION_EXPIRED);
        }
        if !label.belongs_to(channel_id) {
            return abort(abort_codes::E_INVALID_NONCE);
        }
        if !channel.episodes.iter().any(|e| e.label == label) {
            return abort(abort_codes::E_CONTENT_NOT_FOUND);
        }

        InspectResult::ok(Vec::new())
    }

    fn lookup(&self, call: &MoveCall) -> InspectResult {
        if !self.lookup_supported.load(Ordering::SeqCst) {
            return InspectResult::failed(format!("FunctionNotFound: {}", call.function));
        }

        let Some(CallArg::Object(channel_id)) = call.arguments.first() else {
            return InspectResult::failed("InvalidArguments: expected (Channel)");
        };

        let state = self.state.read().unwrap();
        match state.channels.get(channel_id) {
            Some(channel) => {
                let ids: Vec<ContentId> =
                    channel.episodes.iter().map(|e| e.content_id.clone()).collect();
                InspectResult::ok(vec![encode_content_ids(&ids)])
            }
            None => InspectResult::failed(format!("ObjectNotFound: {channel_id}")),
        }
    }
}

#[async_trait]
impl LedgerOracle for MemoryLedger {
    fn ledger_id(&self) -> LedgerId {
        self.id.clone()
    }

    async fn dev_inspect(&self, sender: &Address, kind: &TransactionKind) -> Result<InspectResult> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        let call = kind.call();

        if !self.state.read().unwrap().programs.contains(&call.package) {
            return Ok(InspectResult::failed(format!("PackageNotFound: {}", call.package)));
        }

        let result = if call.function.starts_with(APPROVE_FUNCTION) {
            self.seal_approve(sender, call)
        } else if call.function == LOOKUP_FUNCTION {
            self.lookup(call)
        } else {
            InspectResult::failed(format!("FunctionNotFound: {}", call.function))
        };

        tracing::trace!(
            function = %call.function,
            success = result.success,
            "dev_inspect"
        );
        Ok(result)
    }
}
