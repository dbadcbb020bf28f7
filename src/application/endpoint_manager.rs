//! Endpoint Manager
//!
//! The surface callers use to configure, start and query a producer that is
//! reachable at several URLs. Wires the endpoint set, selector, failure
//! handler and recovery scheduler together.

use crate::application::{FailureHandler, Selector};
use crate::domain::entities::{ConnectionSettings, Endpoint, SessionKey};
use crate::domain::error::EndpointError;
use crate::domain::ports::{RemoteConnection, SessionAffinityStore};
use crate::domain::services::{EndpointSet, SharedEndpointSet};
use crate::domain::value_objects::{EndpointUrls, ProtocolVersion, TrafficClass};
use crate::infrastructure::recovery_scheduler::DEFAULT_COOLDOWN;
use crate::infrastructure::RecoveryScheduler;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Producer traits learned from a started connection and assumed for all.
#[derive(Debug, Default, Clone, Copy)]
struct ProducerTraits {
    protocol_version: Option<ProtocolVersion>,
    transport_security_available: Option<bool>,
}

/// An endpoint waiting out its cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoolingDown {
    pub url: String,
    pub remaining_secs: u64,
}

/// Point-in-time view of the manager, logged by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    pub configured: Vec<String>,
    pub active: Vec<String>,
    pub cooling_down: Vec<CoolingDown>,
    pub authenticated_cursor: usize,
    pub anonymous_cursor: usize,
    pub load_balancing: bool,
    pub generation: u64,
    pub protocol_version: Option<String>,
}

/// Builder for [`EndpointManager`].
pub struct EndpointManagerBuilder {
    prototype: Arc<dyn RemoteConnection>,
    cooldown: Duration,
    settings: ConnectionSettings,
}

impl EndpointManagerBuilder {
    /// Recovery cooldown. A zero duration falls back to the default.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = if cooldown.is_zero() {
            DEFAULT_COOLDOWN
        } else {
            cooldown
        };
        self
    }

    /// Operation timeout in milliseconds. Negative values fall back to the default.
    pub fn operation_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.settings.operation_timeout_ms = ConnectionSettings::normalize_timeout(timeout_ms);
        self
    }

    pub fn transport_security(mut self, enabled: bool) -> Self {
        self.settings.transport_security = enabled;
        self
    }

    pub fn build(self) -> EndpointManager {
        self.settings.apply_to(self.prototype.as_ref());

        let endpoints: SharedEndpointSet = Arc::new(Mutex::new(EndpointSet::new(self.settings)));
        let scheduler = RecoveryScheduler::new(self.cooldown);
        let failures = FailureHandler::new(endpoints.clone(), scheduler.clone());
        let selector = Selector::new(endpoints.clone(), self.prototype.clone(), failures.clone());

        EndpointManager {
            endpoints,
            prototype: self.prototype,
            scheduler,
            failures,
            selector,
            traits: Mutex::new(ProducerTraits::default()),
            host_address: Mutex::new(None),
        }
    }
}

/// Failover and load-balancing manager for one producer.
pub struct EndpointManager {
    endpoints: SharedEndpointSet,
    prototype: Arc<dyn RemoteConnection>,
    scheduler: RecoveryScheduler,
    failures: FailureHandler,
    selector: Selector,
    traits: Mutex<ProducerTraits>,
    /// (effective url, scheme://host[:port]) of the last lookup
    host_address: Mutex<Option<(String, String)>>,
}

impl EndpointManager {
    /// Start building a manager around `prototype`, the connection every
    /// endpoint connection is cloned from.
    pub fn builder(prototype: Arc<dyn RemoteConnection>) -> EndpointManagerBuilder {
        EndpointManagerBuilder {
            prototype,
            cooldown: DEFAULT_COOLDOWN,
            settings: ConnectionSettings::default(),
        }
    }

    // ===== Configuration =====

    /// Replace the endpoint list with the URLs in `raw`.
    ///
    /// Connections of URLs that stay configured are kept as they are; both
    /// routing cursors restart at zero.
    ///
    /// # Errors
    /// `EndpointError::Configuration` for an empty or malformed string; the
    /// previous configuration stays in place.
    pub fn set_endpoints(&self, raw: &str) -> Result<(), EndpointError> {
        let urls = EndpointUrls::parse(raw).map_err(|e| {
            tracing::warn!("rejected endpoint configuration: {}", e);
            e
        })?;

        let summary = self
            .endpoints
            .lock()
            .configure(&urls, self.prototype.as_ref());

        tracing::info!(
            "configured {} producer endpoint(s): {} added, {} retained, {} discarded",
            urls.len(),
            summary.added,
            summary.retained,
            summary.discarded
        );
        Ok(())
    }

    /// URLs currently in rotation, in configuration order.
    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().urls()
    }

    /// Endpoints currently in rotation with their connections.
    pub fn active_endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.lock().endpoints()
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn is_load_balancing(&self) -> bool {
        self.endpoints.lock().is_load_balancing()
    }

    /// URL the next call would be routed to, ignoring session affinity.
    pub fn effective_endpoint(&self) -> Option<String> {
        self.selector.probe().map(|c| c.url().to_string())
    }

    pub fn cooldown(&self) -> Duration {
        self.scheduler.cooldown()
    }

    // ===== Lifecycle =====

    /// Start every configured connection.
    ///
    /// Connections that fail are taken out of rotation individually. The
    /// first one that starts decides the protocol version and transport
    /// security availability assumed for all of them.
    ///
    /// # Errors
    /// `EndpointError::StartupFailure` when no connection could be started.
    pub async fn start(&self) -> Result<(), EndpointError> {
        let snapshot = {
            let set = self.endpoints.lock();
            set.is_configured().then(|| set.endpoints())
        };

        let Some(snapshot) = snapshot else {
            return self.start_prototype().await;
        };

        let attempted = snapshot.len();
        let mut representative: Option<Arc<dyn RemoteConnection>> = None;

        for endpoint in snapshot {
            match endpoint.connection.start().await {
                Ok(()) => {
                    tracing::info!("started producer endpoint {}", endpoint.url);
                    representative.get_or_insert(endpoint.connection);
                }
                Err(e) => {
                    tracing::warn!("producer endpoint {} failed to start: {}", endpoint.url, e);
                    if let Err(e) = self.failures.on_start_failure(&endpoint.connection) {
                        tracing::debug!("{}", e);
                    }
                }
            }
        }

        let Some(representative) = representative else {
            tracing::warn!("none of {} producer endpoint(s) could be started", attempted);
            return Err(EndpointError::StartupFailure { attempted });
        };

        self.adopt(representative.as_ref());
        Ok(())
    }

    async fn start_prototype(&self) -> Result<(), EndpointError> {
        match self.prototype.start().await {
            Ok(()) => {
                tracing::info!("started producer endpoint {}", self.prototype.url());
                self.adopt(self.prototype.as_ref());
                Ok(())
            }
            Err(e) => {
                tracing::warn!("producer endpoint {} failed to start: {}", self.prototype.url(), e);
                Err(EndpointError::StartupFailure { attempted: 1 })
            }
        }
    }

    /// Stop every connection in rotation. Failures are logged and skipped.
    pub async fn stop(&self) {
        let snapshot = {
            let set = self.endpoints.lock();
            if set.is_configured() {
                set.endpoints()
            } else {
                vec![Endpoint::new(self.prototype.url(), self.prototype.clone())]
            }
        };

        for endpoint in snapshot {
            if let Err(e) = endpoint.connection.stop().await {
                tracing::warn!("failed to stop producer endpoint {}: {}", endpoint.url, e);
            }
        }
    }

    fn adopt(&self, connection: &dyn RemoteConnection) {
        let mut traits = self.traits.lock();
        traits.protocol_version = connection.protocol_version();
        traits.transport_security_available = Some(connection.is_transport_security_available());
        tracing::debug!(
            "adopted producer traits from {}: protocol {:?}, transport security available {:?}",
            connection.url(),
            traits.protocol_version,
            traits.transport_security_available
        );
    }

    // ===== Connection Settings =====

    /// Set the operation timeout of every connection. Negative values fall
    /// back to the default.
    pub fn set_operation_timeout_ms(&self, timeout_ms: i64) {
        let timeout_ms = ConnectionSettings::normalize_timeout(timeout_ms);
        self.endpoints.lock().set_operation_timeout_ms(timeout_ms);
        self.prototype.set_operation_timeout_ms(timeout_ms);
    }

    pub fn operation_timeout_ms(&self) -> u64 {
        self.endpoints.lock().settings().operation_timeout_ms
    }

    pub fn set_transport_security(&self, enabled: bool) {
        self.endpoints.lock().set_transport_security(enabled);
        self.prototype.set_transport_security(enabled);
    }

    pub fn transport_security_enabled(&self) -> bool {
        self.endpoints.lock().settings().transport_security
    }

    /// Whether the producer supports transport security, as learned on
    /// start, or from the effective connection before that.
    pub fn is_transport_security_available(&self) -> bool {
        if let Some(available) = self.traits.lock().transport_security_available {
            return available;
        }
        self.selector
            .probe()
            .map(|c| c.is_transport_security_available())
            .unwrap_or(false)
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.traits.lock().protocol_version
    }

    // ===== Availability =====

    /// Whether the effective connection is usable.
    pub fn is_available(&self) -> bool {
        self.selector
            .probe()
            .map(|c| c.is_available())
            .unwrap_or(false)
    }

    pub fn is_refresh_needed(&self) -> bool {
        let needed = !self.is_available();
        tracing::debug!("refresh needed: {}", needed);
        needed
    }

    /// Refresh the effective connection if it is unavailable.
    ///
    /// Returns whether a refresh took place.
    pub async fn refresh(&self) -> Result<bool, EndpointError> {
        if !self.is_refresh_needed() {
            return Ok(false);
        }
        self.force_refresh().await
    }

    /// Refresh the effective connection unconditionally.
    ///
    /// A connection that fails to refresh is taken out of rotation like one
    /// that failed to start.
    pub async fn force_refresh(&self) -> Result<bool, EndpointError> {
        let connection = self
            .selector
            .probe()
            .ok_or(EndpointError::NoEndpointsAvailable)?;

        match connection.refresh(true).await {
            Ok(refreshed) => {
                self.adopt(connection.as_ref());
                Ok(refreshed)
            }
            Err(source) => {
                self.failures.on_start_failure(&connection)?;
                Err(EndpointError::EndpointStartFailure {
                    url: connection.url().to_string(),
                    source,
                })
            }
        }
    }

    /// `scheme://host[:port]` of the effective endpoint.
    pub fn remote_host_address(&self) -> Option<String> {
        let url = self.effective_endpoint()?;

        let mut cached = self.host_address.lock();
        if let Some((cached_url, address)) = cached.as_ref() {
            if *cached_url == url {
                return Some(address.clone());
            }
        }

        let origin = reqwest::Url::parse(&url).ok()?.origin();
        if !origin.is_tuple() {
            return None;
        }
        let address = origin.ascii_serialization();
        *cached = Some((url, address.clone()));
        Some(address)
    }

    // ===== Routing =====

    /// Connection for the current call of session `key`.
    pub async fn connection_for(
        &self,
        class: TrafficClass,
        store: &dyn SessionAffinityStore,
        key: &SessionKey,
    ) -> Result<Arc<dyn RemoteConnection>, EndpointError> {
        self.selector.pick(class, store, key).await
    }

    /// Move session `key` off the endpoint it is bound to.
    ///
    /// The bound endpoint is treated as failed and the session is routed
    /// again. Returns whether a replacement was found; with a single endpoint
    /// in rotation nothing is removed and `false` is returned.
    pub async fn switch_producer_if_possible(
        &self,
        class: TrafficClass,
        store: &dyn SessionAffinityStore,
        key: &SessionKey,
    ) -> Result<bool, EndpointError> {
        let Some(binding) = store.get(key).await else {
            return Ok(false);
        };
        if self.endpoint_count() <= 1 {
            tracing::debug!("no alternative to {} for session {}", binding.url, key);
            return Ok(false);
        }

        tracing::info!("switching session {} away from {}", key, binding.url);
        store.remove(key).await;

        if let Err(e) = self.failures.on_start_failure(&binding.connection) {
            return if e.is_unavailable() { Ok(false) } else { Err(e) };
        }

        match self.selector.pick(class, store, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_unavailable() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ===== Status =====

    pub fn status(&self) -> EndpointStatus {
        let (configured, active, routing, load_balancing, generation) = {
            let set = self.endpoints.lock();
            (
                set.configured_urls().to_vec(),
                set.urls(),
                set.routing(),
                set.is_load_balancing(),
                set.generation(),
            )
        };

        let cooling_down = self
            .scheduler
            .pending()
            .into_iter()
            .filter(|(url, _)| configured.contains(url) && !active.contains(url))
            .map(|(url, remaining)| CoolingDown {
                url,
                remaining_secs: remaining.as_secs(),
            })
            .collect();

        EndpointStatus {
            configured,
            active,
            cooling_down,
            authenticated_cursor: routing.authenticated,
            anonymous_cursor: routing.anonymous,
            load_balancing,
            generation,
            protocol_version: self.protocol_version().map(|v| v.as_str().to_string()),
        }
    }
}
