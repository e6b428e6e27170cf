//! A key server wrapper that counts share requests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use podseal_threshold::{
    KeyServer, KeyServerId, KeyServerInfo, LocalKeyServer, Result, ShareRequest, ShareResponse,
    ThresholdError,
};

/// Wraps a [`LocalKeyServer`], counting `fetch_shares` calls.
///
/// While offline, every share request fails as unreachable.
pub struct CountingKeyServer {
    inner: LocalKeyServer,
    fetches: AtomicUsize,
    offline: AtomicBool,
}

impl CountingKeyServer {
    pub fn new(inner: LocalKeyServer) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Number of share requests received, online or not.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyServer for CountingKeyServer {
    fn id(&self) -> &KeyServerId {
        self.inner.id()
    }

    async fn public_info(&self) -> Result<KeyServerInfo> {
        self.inner.public_info().await
    }

    async fn fetch_shares(&self, request: ShareRequest) -> Result<ShareResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ThresholdError::Unavailable {
                server: self.inner.id().clone(),
                reason: "offline".into(),
            });
        }
        self.inner.fetch_shares(request).await
    }
}
