//! Endpoint Set
//!
//! Ordered collection of active endpoints plus the two round-robin cursors.
//! The set itself is not synchronized: the manager keeps it behind a single
//! mutex so that membership and cursors always change together.

use crate::domain::entities::{ConnectionSettings, Endpoint};
use crate::domain::ports::{same_connection, RemoteConnection};
use crate::domain::value_objects::{EndpointUrls, TrafficClass};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Endpoint set shared by the selector, the failure handler and recovery tasks.
pub type SharedEndpointSet = Arc<Mutex<EndpointSet>>;

/// Round-robin cursors, one per traffic class.
///
/// A cursor is only meaningful modulo the current set size. It is never
/// clamped: after the set shrinks it may exceed the size and is reduced with
/// `%` at selection time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoutingState {
    pub authenticated: usize,
    pub anonymous: usize,
}

impl RoutingState {
    pub fn cursor(&self, class: TrafficClass) -> usize {
        match class {
            TrafficClass::Authenticated => self.authenticated,
            TrafficClass::Anonymous => self.anonymous,
        }
    }

    fn cursor_mut(&mut self, class: TrafficClass) -> &mut usize {
        match class {
            TrafficClass::Authenticated => &mut self.authenticated,
            TrafficClass::Anonymous => &mut self.anonymous,
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Keep each cursor pointing at the same "next" endpoint after the entry
    /// at `removed` left a set of `old_len` entries.
    ///
    /// When the cursor pointed at the removed entry it now points at the same
    /// index, which holds the entry that used to follow it.
    fn after_removal(&mut self, removed: usize, old_len: usize) {
        for cursor in [&mut self.authenticated, &mut self.anonymous] {
            let next = *cursor % old_len;
            *cursor = if next > removed { next - 1 } else { next };
        }
    }

    /// Keep each cursor pointing at the same "next" endpoint after an entry
    /// was inserted at `inserted` into a set of `old_len` entries.
    fn after_insertion(&mut self, inserted: usize, old_len: usize) {
        for cursor in [&mut self.authenticated, &mut self.anonymous] {
            if old_len == 0 {
                *cursor = 0;
                continue;
            }
            let next = *cursor % old_len;
            *cursor = if next >= inserted { next + 1 } else { next };
        }
    }
}

/// Outcome of `EndpointSet::configure`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigureSummary {
    /// URLs new to the set; a connection was cloned from the prototype
    pub added: usize,
    /// URLs already active; their connection was kept
    pub retained: usize,
    /// Active URLs dropped from the configuration
    pub discarded: usize,
}

/// An endpoint taken out of rotation.
#[derive(Debug)]
pub struct Removed {
    pub endpoint: Endpoint,
    /// Position it held in the active sequence
    pub index: usize,
    /// Number of endpoints left in rotation
    pub remaining: usize,
    /// Configuration generation it belongs to
    pub generation: u64,
}

/// Outcome of `EndpointSet::reinsert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reinsertion {
    /// Back in rotation at the given position
    Reinserted { index: usize },
    /// The URL is already active (reconfigured while cooling down); the
    /// returning connection was dropped
    AlreadyPresent,
    /// The set was reconfigured since removal; the returning connection was dropped
    Superseded,
}

/// Active endpoints, in configuration order, with their routing cursors.
///
/// Invariant: `by_url` keys are exactly the entries of `active_urls`.
pub struct EndpointSet {
    /// Full configuration, in configuration order
    configured: Vec<String>,
    /// Endpoints currently in rotation, a subsequence of `configured`
    active_urls: Vec<String>,
    by_url: HashMap<String, Endpoint>,
    routing: RoutingState,
    settings: ConnectionSettings,
    /// Bumped on every `configure`
    generation: u64,
}

impl EndpointSet {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            configured: Vec::new(),
            active_urls: Vec::new(),
            by_url: HashMap::new(),
            routing: RoutingState::default(),
            settings,
            generation: 0,
        }
    }

    /// Replace the configuration.
    ///
    /// Endpoints whose URL stays configured keep their connection untouched.
    /// New URLs get a connection cloned from `prototype`, with the current
    /// settings applied. Dropped URLs are discarded without being stopped.
    /// Both cursors go back to zero.
    pub fn configure(
        &mut self,
        urls: &EndpointUrls,
        prototype: &dyn RemoteConnection,
    ) -> ConfigureSummary {
        let mut summary = ConfigureSummary::default();
        let mut by_url = HashMap::with_capacity(urls.len());

        for url in urls.iter() {
            let endpoint = match self.by_url.remove(url) {
                Some(existing) => {
                    summary.retained += 1;
                    existing
                }
                None => {
                    let connection = prototype.clone_for(url);
                    self.settings.apply_to(connection.as_ref());
                    summary.added += 1;
                    Endpoint::new(url.clone(), connection)
                }
            };
            by_url.insert(url.clone(), endpoint);
        }

        summary.discarded = self.by_url.len();
        self.by_url = by_url;
        self.configured = urls.as_slice().to_vec();
        self.active_urls = self.configured.clone();
        self.routing.reset();
        self.generation += 1;

        summary
    }

    /// Pick the next endpoint for `class` and advance its cursor.
    pub fn next(&mut self, class: TrafficClass) -> Option<Endpoint> {
        if self.active_urls.is_empty() {
            return None;
        }
        let cursor = self.routing.cursor_mut(class);
        let index = *cursor % self.active_urls.len();
        *cursor = cursor.wrapping_add(1);

        self.by_url.get(&self.active_urls[index]).cloned()
    }

    /// The endpoint `next` would return, without moving the cursor.
    pub fn peek(&self, class: TrafficClass) -> Option<Endpoint> {
        if self.active_urls.is_empty() {
            return None;
        }
        let index = self.routing.cursor(class) % self.active_urls.len();
        self.by_url.get(&self.active_urls[index]).cloned()
    }

    /// Whether `connection` is the active connection for `url`.
    pub fn is_current(&self, url: &str, connection: &Arc<dyn RemoteConnection>) -> bool {
        self.by_url
            .get(url)
            .map(|e| same_connection(&e.connection, connection))
            .unwrap_or(false)
    }

    /// Take `url` out of rotation.
    ///
    /// Returns `None` when the URL is not active. An emptied set is reported
    /// through `Removed::remaining`.
    pub fn remove(&mut self, url: &str) -> Option<Removed> {
        let index = self.active_urls.iter().position(|u| u == url)?;
        let endpoint = self.by_url.remove(url)?;
        let old_len = self.active_urls.len();
        self.active_urls.remove(index);
        self.routing.after_removal(index, old_len);

        Some(Removed {
            endpoint,
            index,
            remaining: self.active_urls.len(),
            generation: self.generation,
        })
    }

    /// Put a removed endpoint back into rotation.
    ///
    /// The endpoint regains its configuration-order position and receives the
    /// current settings, which may have changed while it was cooling down.
    pub fn reinsert(&mut self, endpoint: Endpoint, generation: u64) -> Reinsertion {
        if generation != self.generation {
            return Reinsertion::Superseded;
        }
        if self.by_url.contains_key(&endpoint.url) {
            return Reinsertion::AlreadyPresent;
        }
        let Some(rank) = self.rank(&endpoint.url) else {
            return Reinsertion::Superseded;
        };

        let index = self
            .active_urls
            .iter()
            .take_while(|u| self.rank(u).map(|r| r < rank).unwrap_or(false))
            .count();

        self.settings.apply_to(endpoint.connection.as_ref());
        self.routing.after_insertion(index, self.active_urls.len());
        self.active_urls.insert(index, endpoint.url.clone());
        self.by_url.insert(endpoint.url.clone(), endpoint);

        Reinsertion::Reinserted { index }
    }

    fn rank(&self, url: &str) -> Option<usize> {
        self.configured.iter().position(|u| u == url)
    }

    /// Snapshot of the active endpoints, in rotation order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.active_urls
            .iter()
            .filter_map(|u| self.by_url.get(u).cloned())
            .collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.active_urls.clone()
    }

    pub fn configured_urls(&self) -> &[String] {
        &self.configured
    }

    pub fn len(&self) -> usize {
        self.active_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_urls.is_empty()
    }

    /// Whether an endpoint string was ever applied.
    pub fn is_configured(&self) -> bool {
        !self.configured.is_empty()
    }

    pub fn is_load_balancing(&self) -> bool {
        self.active_urls.len() > 1
    }

    pub fn routing(&self) -> RoutingState {
        self.routing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settings(&self) -> ConnectionSettings {
        self.settings
    }

    /// Store the timeout and push it to every active connection.
    pub fn set_operation_timeout_ms(&mut self, timeout_ms: u64) {
        self.settings.operation_timeout_ms = timeout_ms;
        for endpoint in self.by_url.values() {
            endpoint.connection.set_operation_timeout_ms(timeout_ms);
        }
    }

    /// Store the security flag and push it to every active connection.
    pub fn set_transport_security(&mut self, enabled: bool) {
        self.settings.transport_security = enabled;
        for endpoint in self.by_url.values() {
            endpoint.connection.set_transport_security(enabled);
        }
    }
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self::new(ConnectionSettings::default())
    }
}
