//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use producer_endpoints::{ConnectionError, ProtocolVersion, RemoteConnection};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Which URLs are down, and how often each was started.
#[derive(Default)]
pub struct Producers {
    down: HashSet<String>,
    starts: HashMap<String, usize>,
}

/// In-memory connection whose reachability is scripted per URL.
pub struct FakeConnection {
    url: String,
    producers: Arc<Mutex<Producers>>,
    started: AtomicBool,
    timeout_ms: AtomicU64,
    secure: AtomicBool,
}

impl FakeConnection {
    pub fn prototype(url: &str) -> Arc<Self> {
        Arc::new(Self::bound(url, Arc::new(Mutex::new(Producers::default()))))
    }

    fn bound(url: &str, producers: Arc<Mutex<Producers>>) -> Self {
        Self {
            url: url.to_string(),
            producers,
            started: AtomicBool::new(false),
            timeout_ms: AtomicU64::new(0),
            secure: AtomicBool::new(false),
        }
    }

    pub fn take_down(&self, url: &str) {
        self.producers.lock().down.insert(url.to_string());
    }

    pub fn bring_up(&self, url: &str) {
        self.producers.lock().down.remove(url);
    }

    pub fn starts(&self, url: &str) -> usize {
        self.producers.lock().starts.get(url).copied().unwrap_or(0)
    }

    fn is_down(&self) -> bool {
        self.producers.lock().down.contains(&self.url)
    }
}

#[async_trait]
impl RemoteConnection for FakeConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn start(&self) -> Result<(), ConnectionError> {
        *self
            .producers
            .lock()
            .starts
            .entry(self.url.clone())
            .or_insert(0) += 1;
        // yield so concurrent callers interleave
        tokio::task::yield_now().await;
        if self.is_down() {
            return Err(ConnectionError::Unreachable(self.url.clone()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh(&self, _force: bool) -> Result<bool, ConnectionError> {
        self.start().await?;
        Ok(true)
    }

    fn is_available(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.is_down()
    }

    fn set_operation_timeout_ms(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::SeqCst);
    }

    fn operation_timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::SeqCst)
    }

    fn set_transport_security(&self, enabled: bool) {
        self.secure.store(enabled, Ordering::SeqCst);
    }

    fn transport_security_enabled(&self) -> bool {
        self.secure.load(Ordering::SeqCst)
    }

    fn is_transport_security_available(&self) -> bool {
        self.url.starts_with("https://")
    }

    fn protocol_version(&self) -> Option<ProtocolVersion> {
        Some(ProtocolVersion::V1)
    }

    fn clone_for(&self, url: &str) -> Arc<dyn RemoteConnection> {
        Arc::new(Self::bound(url, self.producers.clone()))
    }
}
