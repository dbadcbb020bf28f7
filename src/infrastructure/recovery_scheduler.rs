//! Recovery Scheduler
//!
//! Puts endpoints removed after a start failure back into rotation once their
//! cooldown has elapsed. One fire-and-forget task per removal; the endpoint's
//! health is not checked here, the selector re-validates it lazily on the
//! next start attempt.

use crate::domain::entities::{CooldownTimer, MAX_COOLDOWN};
use crate::domain::services::{EndpointSet, Reinsertion, Removed};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Cooldown applied when none is configured.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct PendingRecovery {
    id: u64,
    timer: CooldownTimer,
}

/// Schedules delayed re-insertion of removed endpoints.
///
/// Timers are never cancelled. A timer whose endpoint set was dropped or
/// reconfigured in the meantime fires into a no-op.
#[derive(Clone)]
pub struct RecoveryScheduler {
    cooldown: Duration,
    /// Pending timers by URL, for status reporting
    pending: Arc<DashMap<String, PendingRecovery>>,
    next_id: Arc<AtomicU64>,
}

impl RecoveryScheduler {
    /// Cooldowns above `MAX_COOLDOWN` are capped.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: cooldown.min(MAX_COOLDOWN),
            pending: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Re-insert `removed` into `endpoints` once the cooldown has elapsed,
    /// measured from now.
    ///
    /// The task only holds a weak reference to the set and takes its lock for
    /// the duration of the reinsertion.
    pub fn schedule(
        &self,
        endpoints: Weak<Mutex<EndpointSet>>,
        removed: Removed,
    ) -> JoinHandle<Option<Reinsertion>> {
        let timer = CooldownTimer::new(self.cooldown);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = removed.endpoint.url.clone();
        self.pending.insert(url.clone(), PendingRecovery { id, timer });

        let pending = self.pending.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(timer.deadline()).await;
            pending.remove_if(&url, |_, p| p.id == id);

            let Some(endpoints) = endpoints.upgrade() else {
                tracing::debug!("endpoint set dropped, discarding recovery of {}", url);
                return None;
            };

            let outcome = endpoints
                .lock()
                .reinsert(removed.endpoint, removed.generation);

            match outcome {
                Reinsertion::Reinserted { index } => {
                    tracing::info!(
                        "endpoint {} back in rotation at position {} after {}s cooldown",
                        url,
                        index,
                        timer.reinsert_after.as_secs()
                    );
                }
                Reinsertion::AlreadyPresent => {
                    tracing::debug!("endpoint {} already active, dropping cooled-down connection", url);
                }
                Reinsertion::Superseded => {
                    tracing::debug!("endpoints reconfigured since {} was removed, skipping recovery", url);
                }
            }

            Some(outcome)
        })
    }

    /// URLs waiting for re-insertion with their remaining cooldown, sorted by URL.
    pub fn pending(&self) -> Vec<(String, Duration)> {
        let mut pending: Vec<_> = self
            .pending
            .iter()
            .map(|e| (e.key().clone(), e.value().timer.remaining()))
            .collect();
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        pending
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.contains_key(url)
    }
}

impl Default for RecoveryScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
