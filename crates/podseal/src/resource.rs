//! Playable resources and their lifecycle.
//!
//! Decrypted plaintext is registered in a [`ResourceTable`] and handed out as
//! a [`PlayableResource`]: a local URL plus a MIME type. The resource owns its
//! table entry; revoking it, or dropping it, removes the entry exactly once.
//!
//! [`PlayerSlot`] models a view that shows one resource at a time. Loads are
//! stamped with a generation so a result that arrives after the view moved on
//! or was torn down is released instead of displayed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{debug, trace};

const URL_PREFIX: &str = "blob:podseal/";

struct Entry {
    bytes: Bytes,
    mime_type: String,
}

/// Registry of live playable resources.
#[derive(Default)]
pub struct ResourceTable {
    entries: Mutex<HashMap<u64, Entry>>,
    next_handle: AtomicU64,
    created: AtomicUsize,
    revoked: AtomicUsize,
}

impl ResourceTable {
    /// Create an empty table.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `bytes` and return the owning resource.
    pub fn create(self: &Arc<Self>, bytes: Bytes, mime_type: impl Into<String>) -> PlayableResource {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        let mime_type = mime_type.into();
        self.entries.lock().unwrap().insert(
            handle,
            Entry {
                bytes,
                mime_type: mime_type.clone(),
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        trace!(handle, %mime_type, "resource created");

        PlayableResource {
            table: self.clone(),
            handle,
            url: format!("{URL_PREFIX}{handle}"),
            mime_type,
            released: false,
        }
    }

    fn revoke(&self, handle: u64) {
        if self.entries.lock().unwrap().remove(&handle).is_some() {
            self.revoked.fetch_add(1, Ordering::SeqCst);
            trace!(handle, "resource revoked");
        }
    }

    /// Resolve a resource URL to its bytes and MIME type.
    pub fn resolve(&self, url: &str) -> Option<(Bytes, String)> {
        let handle: u64 = url.strip_prefix(URL_PREFIX)?.parse().ok()?;
        self.entries
            .lock()
            .unwrap()
            .get(&handle)
            .map(|e| (e.bytes.clone(), e.mime_type.clone()))
    }

    /// Number of resources not yet revoked.
    pub fn live_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Total resources ever created.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Total revocations.
    pub fn revoked_count(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }
}

/// Decrypted content ready to hand to a player.
///
/// Owned by exactly one consumer. Call [`PlayableResource::revoke`] when done;
/// dropping it without revoking releases it too.
pub struct PlayableResource {
    table: Arc<ResourceTable>,
    handle: u64,
    url: String,
    mime_type: String,
    released: bool,
}

impl PlayableResource {
    /// Local URL the player loads.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Declared MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The plaintext.
    pub fn bytes(&self) -> Bytes {
        self.table
            .resolve(&self.url)
            .map(|(bytes, _)| bytes)
            .unwrap_or_default()
    }

    /// Release the backing entry.
    pub fn revoke(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.table.revoke(self.handle);
        }
    }
}

impl std::fmt::Debug for PlayableResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayableResource")
            .field("url", &self.url)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl Drop for PlayableResource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Proof that a load was started; only the latest ticket may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    current: Option<PlayableResource>,
    torn_down: bool,
}

/// A view showing at most one resource.
#[derive(Default)]
pub struct PlayerSlot {
    state: Mutex<SlotState>,
}

impl PlayerSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load, superseding any load in flight.
    pub fn begin_load(&self) -> LoadTicket {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        LoadTicket {
            generation: state.generation,
        }
    }

    /// Install the result of a load.
    ///
    /// Returns false, and releases `resource`, if the slot was torn down or a
    /// newer load started. On success the previous resource is released.
    pub fn complete(&self, ticket: LoadTicket, resource: PlayableResource) -> bool {
        let previous = {
            let mut state = self.state.lock().unwrap();
            if state.torn_down || ticket.generation != state.generation {
                debug!(url = resource.url(), "discarding stale load result");
                drop(state);
                resource.revoke();
                return false;
            }
            state.current.replace(resource)
        };
        if let Some(previous) = previous {
            previous.revoke();
        }
        true
    }

    /// URL of the resource being shown.
    pub fn current_url(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .map(|r| r.url().to_string())
    }

    /// Release the current resource and reject every pending load.
    pub fn teardown(&self) {
        let current = {
            let mut state = self.state.lock().unwrap();
            state.torn_down = true;
            state.generation += 1;
            state.current.take()
        };
        if let Some(resource) = current {
            resource.revoke();
        }
    }

    /// Whether [`Self::teardown`] has run.
    pub fn is_torn_down(&self) -> bool {
        self.state.lock().unwrap().torn_down
    }
}
