//! Session cache with a single in-flight signature per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use podseal_core::{Address, Clock, ObjectId};

use crate::error::{Result, SessionError};
use crate::key::{PendingSession, SessionKey};
use crate::wallet::SubjectWallet;

type SessionSlot = Arc<AsyncMutex<Option<Arc<SessionKey>>>>;

/// Caches signed sessions per (subject, policy program).
///
/// Each key has its own async lock. A caller that finds no usable session
/// holds the lock while the wallet is prompted, so concurrent callers for the
/// same key wait for that one signature instead of prompting again.
pub struct SessionManager {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<(Address, ObjectId), SessionSlot>>,
}

impl SessionManager {
    /// Create an empty manager.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: (Address, ObjectId)) -> SessionSlot {
        self.slots
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .clone()
    }

    /// Return the cached session for the wallet's subject, or negotiate one.
    ///
    /// A cached, unexpired session is returned without touching the wallet.
    /// Failures are returned as-is; nothing is retried.
    pub async fn get_or_create(
        &self,
        wallet: &dyn SubjectWallet,
        policy_program_id: &ObjectId,
        ttl_minutes: u32,
    ) -> Result<Arc<SessionKey>> {
        let address = wallet.active_address().ok_or(SessionError::NoSubject)?;
        let slot = self.slot((address, *policy_program_id));
        let mut cached = slot.lock().await;

        let now = self.clock.now_millis();
        if let Some(session) = cached.as_ref() {
            if !session.is_expired(now) {
                return Ok(session.clone());
            }
            debug!(subject = %address, expired_at = session.expires_at(), "session expired");
            *cached = None;
        }

        let pending = PendingSession::new(address, *policy_program_id, ttl_minutes, now)?;
        let signed = wallet
            .sign_personal_message(&pending.personal_message())
            .await?;
        let session = Arc::new(pending.attach(signed)?);

        info!(
            subject = %address,
            policy = %policy_program_id,
            expires_at = session.expires_at(),
            "session negotiated"
        );
        *cached = Some(session.clone());
        Ok(session)
    }

    /// The cached session for a key, if present and unexpired.
    pub fn cached(&self, address: &Address, policy_program_id: &ObjectId) -> Option<Arc<SessionKey>> {
        let slot = self.slots.lock().unwrap().get(&(*address, *policy_program_id))?.clone();
        let guard = slot.try_lock().ok()?;
        let session = guard
            .as_ref()
            .filter(|s| !s.is_expired(self.clock.now_millis()))
            .cloned();
        session
    }

    /// Drop the session for one key.
    pub fn invalidate(&self, address: &Address, policy_program_id: &ObjectId) {
        self.slots
            .lock()
            .unwrap()
            .remove(&(*address, *policy_program_id));
    }

    /// Drop every cached session.
    pub fn clear(&self) {
        self.slots.lock().unwrap().clear();
    }

    /// Number of keys with a slot.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
