//! DashMap Session Store
//!
//! Implements SessionAffinityStore using DashMap for lock-free concurrent access.

use crate::domain::entities::{Binding, SessionKey};
use crate::domain::ports::SessionAffinityStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// DashMap-backed session affinity store.
///
/// Supports periodic garbage collection of bindings of sessions that have
/// gone quiet.
pub struct DashMapSessionStore {
    bindings: Arc<DashMap<SessionKey, Binding>>,
}

impl DashMapSessionStore {
    pub fn new() -> Self {
        Self {
            bindings: Arc::new(DashMap::new()),
        }
    }

    /// Start the background garbage collection task.
    ///
    /// Removes bindings that have not been used within the TTL.
    pub fn start_gc(&self, ttl: Duration, interval: Duration) {
        let bindings = self.bindings.clone();

        tokio::spawn(async move {
            loop {
                let removed = remove_expired(&bindings, ttl);
                if removed > 0 {
                    tracing::debug!("session GC removed {} expired bindings", removed);
                }

                tokio::time::sleep(interval).await;
            }
        });
    }

    /// Remove bindings unused for longer than `ttl`. Returns how many were removed.
    pub fn cleanup_expired(&self, ttl: Duration) -> usize {
        remove_expired(&self.bindings, ttl)
    }

    pub fn count(&self) -> usize {
        self.bindings.len()
    }
}

fn remove_expired(bindings: &DashMap<SessionKey, Binding>, ttl: Duration) -> usize {
    let now = Instant::now();
    let before = bindings.len();
    bindings.retain(|_, binding| now.duration_since(binding.last_seen) <= ttl);
    before.saturating_sub(bindings.len())
}

impl Default for DashMapSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionAffinityStore for DashMapSessionStore {
    async fn get(&self, key: &SessionKey) -> Option<Binding> {
        self.bindings.get(key).map(|e| e.value().clone())
    }

    async fn set(&self, key: SessionKey, binding: Binding) {
        self.bindings.insert(key, binding);
    }

    async fn remove(&self, key: &SessionKey) {
        self.bindings.remove(key);
    }

    async fn touch(&self, key: &SessionKey) {
        if let Some(mut entry) = self.bindings.get_mut(key) {
            entry.touch();
        }
    }
}
