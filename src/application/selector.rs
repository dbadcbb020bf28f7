//! Selector
//!
//! Chooses the connection a call is routed to: session affinity first, then
//! round-robin per traffic class, starting connections lazily and failing
//! over when a start fails.

use crate::application::FailureHandler;
use crate::domain::entities::{Binding, Endpoint, SessionKey};
use crate::domain::error::EndpointError;
use crate::domain::ports::{RemoteConnection, SessionAffinityStore};
use crate::domain::services::SharedEndpointSet;
use crate::domain::value_objects::TrafficClass;
use std::sync::Arc;

/// Endpoint selection with session affinity and failover.
#[derive(Clone)]
pub struct Selector {
    endpoints: SharedEndpointSet,
    /// Used as-is while no endpoint string has been configured
    prototype: Arc<dyn RemoteConnection>,
    failures: FailureHandler,
}

impl Selector {
    pub fn new(
        endpoints: SharedEndpointSet,
        prototype: Arc<dyn RemoteConnection>,
        failures: FailureHandler,
    ) -> Self {
        Self {
            endpoints,
            prototype,
            failures,
        }
    }

    /// Pick the connection for a call and bind the session to it.
    ///
    /// 1. A binding whose connection is still active wins; stale bindings
    ///    are discarded.
    /// 2. Before any configuration, the prototype is used unbound.
    /// 3. Otherwise the cursor of `class` picks the next endpoint.
    /// 4. An unavailable connection is started; a failed start removes the
    ///    endpoint and selection starts over.
    ///
    /// Every failed attempt shrinks the set by one, so the loop is bounded by
    /// the set size at the start of the call.
    ///
    /// # Errors
    /// `EndpointError::NoEndpointsAvailable` when every endpoint is out of
    /// rotation, `EndpointError::EndpointStartFailure` when the unconfigured
    /// prototype cannot be started.
    pub async fn pick(
        &self,
        class: TrafficClass,
        store: &dyn SessionAffinityStore,
        key: &SessionKey,
    ) -> Result<Arc<dyn RemoteConnection>, EndpointError> {
        let budget = self.endpoints.lock().len() + 1;

        for attempt in 1..=budget {
            if let Some(binding) = store.get(key).await {
                let current = self
                    .endpoints
                    .lock()
                    .is_current(&binding.url, &binding.connection);
                if current {
                    store.touch(key).await;
                    tracing::debug!("session {} stays on {}", key, binding.url);
                    return Ok(binding.connection);
                }
                store.remove(key).await;
                tracing::debug!("discarded stale binding of session {} to {}", key, binding.url);
            }

            let Some(endpoint) = self.candidate(class)? else {
                return self.bootstrap().await;
            };

            if !endpoint.connection.is_available() {
                if let Err(e) = endpoint.connection.start().await {
                    tracing::warn!(
                        "endpoint {} failed to start (attempt {}/{}): {}",
                        endpoint.url,
                        attempt,
                        budget,
                        e
                    );
                    self.failures.on_start_failure(&endpoint.connection)?;
                    continue;
                }
            }

            store
                .set(
                    key.clone(),
                    Binding::new(endpoint.url.clone(), endpoint.connection.clone()),
                )
                .await;
            tracing::debug!(
                "session {} bound to {} ({} traffic)",
                key,
                endpoint.url,
                class.as_str()
            );
            return Ok(endpoint.connection);
        }

        let exhausted = EndpointError::SelectionRetryExhausted { attempts: budget };
        tracing::warn!("{}, reporting producer unavailable", exhausted);
        Err(EndpointError::NoEndpointsAvailable)
    }

    /// Next endpoint in rotation, `None` while unconfigured.
    fn candidate(&self, class: TrafficClass) -> Result<Option<Endpoint>, EndpointError> {
        let mut set = self.endpoints.lock();
        if set.is_empty() {
            if set.is_configured() {
                return Err(EndpointError::NoEndpointsAvailable);
            }
            return Ok(None);
        }
        Ok(set.next(class))
    }

    async fn bootstrap(&self) -> Result<Arc<dyn RemoteConnection>, EndpointError> {
        if !self.prototype.is_available() {
            self.prototype
                .start()
                .await
                .map_err(|source| EndpointError::EndpointStartFailure {
                    url: self.prototype.url().to_string(),
                    source,
                })?;
        }
        Ok(self.prototype.clone())
    }

    /// Connection a call would be routed to right now, without starting it,
    /// binding a session or moving a cursor. `None` when every endpoint is
    /// out of rotation.
    pub fn probe(&self) -> Option<Arc<dyn RemoteConnection>> {
        let set = self.endpoints.lock();
        if !set.is_configured() {
            return Some(self.prototype.clone());
        }
        set.peek(TrafficClass::Anonymous).map(|e| e.connection)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapSessionStore;
    use crate::domain::ports::same_connection;
    use crate::domain::services::EndpointSet;
    use crate::domain::value_objects::EndpointUrls;
    use crate::infrastructure::RecoveryScheduler;
    use crate::test_support::ScriptedConnection;
    use parking_lot::Mutex;
    use std::time::Duration;

    // ===== Test Helpers =====

    struct Fixture {
        selector: Selector,
        endpoints: SharedEndpointSet,
        prototype: Arc<ScriptedConnection>,
        store: DashMapSessionStore,
    }

    fn fixture(raw: Option<&str>) -> Fixture {
        let prototype = ScriptedConnection::prototype("http://prototype/wsdl");
        let mut set = EndpointSet::default();
        if let Some(raw) = raw {
            set.configure(&EndpointUrls::parse(raw).unwrap(), prototype.as_ref());
        }
        let endpoints = Arc::new(Mutex::new(set));
        let failures = FailureHandler::new(
            endpoints.clone(),
            RecoveryScheduler::new(Duration::from_secs(60)),
        );
        let selector = Selector::new(endpoints.clone(), prototype.clone(), failures);
        Fixture {
            selector,
            endpoints,
            prototype,
            store: DashMapSessionStore::new(),
        }
    }

    impl Fixture {
        async fn pick(&self, class: TrafficClass, session: &str) -> Result<String, EndpointError> {
            self.selector
                .pick(class, &self.store, &SessionKey::new(session))
                .await
                .map(|c| c.url().to_string())
        }
    }

    // ===== Round-Robin Tests =====

    #[tokio::test]
    async fn test_fresh_sessions_visit_each_endpoint_once_in_order() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl http://c/wsdl"));

        let mut visited = Vec::new();
        for i in 0..3 {
            visited.push(f.pick(TrafficClass::Anonymous, &format!("s{}", i)).await.unwrap());
        }

        assert_eq!(visited, vec!["http://a/wsdl", "http://b/wsdl", "http://c/wsdl"]);
    }

    #[tokio::test]
    async fn test_traffic_classes_rotate_independently() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl"));

        assert_eq!(f.pick(TrafficClass::Anonymous, "info").await.unwrap(), "http://a/wsdl");
        assert_eq!(f.pick(TrafficClass::Authenticated, "user-1").await.unwrap(), "http://a/wsdl");
        assert_eq!(f.pick(TrafficClass::Authenticated, "user-2").await.unwrap(), "http://b/wsdl");
        assert_eq!(f.pick(TrafficClass::Anonymous, "info-2").await.unwrap(), "http://b/wsdl");
    }

    #[tokio::test]
    async fn test_connections_start_lazily_once() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl"));

        for i in 0..4 {
            f.pick(TrafficClass::Anonymous, &format!("s{}", i)).await.unwrap();
        }

        assert_eq!(f.prototype.start_calls("http://a/wsdl"), 1);
        assert_eq!(f.prototype.start_calls("http://b/wsdl"), 1);
    }

    // ===== Session Affinity Tests =====

    #[tokio::test]
    async fn test_bound_session_sticks_regardless_of_cursor() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl http://c/wsdl"));
        let first = f.pick(TrafficClass::Authenticated, "user").await.unwrap();

        for i in 0..5 {
            f.pick(TrafficClass::Authenticated, &format!("other-{}", i)).await.unwrap();
            assert_eq!(f.pick(TrafficClass::Authenticated, "user").await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_sticky_hit_does_not_move_cursor() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl"));
        f.pick(TrafficClass::Anonymous, "s").await.unwrap();
        let routing = f.endpoints.lock().routing();

        f.pick(TrafficClass::Anonymous, "s").await.unwrap();

        assert_eq!(f.endpoints.lock().routing(), routing);
    }

    #[tokio::test]
    async fn test_stale_binding_is_discarded_and_rebound() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl"));
        assert_eq!(f.pick(TrafficClass::Authenticated, "user").await.unwrap(), "http://a/wsdl");

        f.endpoints.lock().remove("http://a/wsdl");

        assert_eq!(f.pick(TrafficClass::Authenticated, "user").await.unwrap(), "http://b/wsdl");
        let binding = f.store.get(&SessionKey::new("user")).await.unwrap();
        assert_eq!(binding.url, "http://b/wsdl");
    }

    // ===== Failover Tests =====

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_removes_endpoint_and_fails_over() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl http://c/wsdl"));
        f.prototype.fail("http://b/wsdl");

        assert_eq!(f.pick(TrafficClass::Anonymous, "s1").await.unwrap(), "http://a/wsdl");
        assert_eq!(f.pick(TrafficClass::Anonymous, "s2").await.unwrap(), "http://c/wsdl");

        assert_eq!(f.endpoints.lock().urls(), vec!["http://a/wsdl", "http://c/wsdl"]);
        for i in 0..4 {
            assert_ne!(
                f.pick(TrafficClass::Anonymous, &format!("n{}", i)).await.unwrap(),
                "http://b/wsdl"
            );
        }
        assert_eq!(f.prototype.start_calls("http://b/wsdl"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_endpoints_down_is_fatal_and_terminates() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl http://c/wsdl"));
        for url in ["http://a/wsdl", "http://b/wsdl", "http://c/wsdl"] {
            f.prototype.fail(url);
        }

        let result = f.pick(TrafficClass::Authenticated, "user").await;
        assert!(matches!(result, Err(EndpointError::NoEndpointsAvailable)));
        assert!(f.endpoints.lock().is_empty());

        let again = f.pick(TrafficClass::Authenticated, "user").await;
        assert!(matches!(again, Err(EndpointError::NoEndpointsAvailable)));
        for url in ["http://a/wsdl", "http://b/wsdl", "http://c/wsdl"] {
            assert_eq!(f.prototype.start_calls(url), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_endpoint_is_retried_lazily() {
        let f = fixture(Some("http://a/wsdl"));
        f.prototype.fail("http://a/wsdl");
        assert!(f.pick(TrafficClass::Anonymous, "s").await.is_err());

        f.prototype.heal("http://a/wsdl");
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(f.pick(TrafficClass::Anonymous, "s").await.unwrap(), "http://a/wsdl");
        assert_eq!(f.prototype.start_calls("http://a/wsdl"), 2);
    }

    // ===== Bootstrap Tests =====

    #[tokio::test]
    async fn test_unconfigured_uses_prototype_unbound() {
        let f = fixture(None);

        let connection = f
            .selector
            .pick(TrafficClass::Anonymous, &f.store, &SessionKey::new("s"))
            .await
            .unwrap();

        let prototype: Arc<dyn RemoteConnection> = f.prototype.clone();
        assert!(same_connection(&connection, &prototype));
        assert!(f.store.get(&SessionKey::new("s")).await.is_none());
        assert_eq!(f.prototype.start_calls("http://prototype/wsdl"), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_prototype_start_failure() {
        let f = fixture(None);
        f.prototype.fail("http://prototype/wsdl");

        let result = f.pick(TrafficClass::Anonymous, "s").await;

        assert!(matches!(
            result,
            Err(EndpointError::EndpointStartFailure { ref url, .. }) if url == "http://prototype/wsdl"
        ));
    }

    // ===== Probe Tests =====

    #[tokio::test]
    async fn test_probe_does_not_bind_or_advance() {
        let f = fixture(Some("http://a/wsdl http://b/wsdl"));

        let probed = f.selector.probe().unwrap();

        assert_eq!(probed.url(), "http://a/wsdl");
        assert_eq!(f.endpoints.lock().routing().anonymous, 0);
        assert_eq!(f.prototype.start_calls("http://a/wsdl"), 0);
    }

    #[tokio::test]
    async fn test_probe_when_exhausted() {
        let f = fixture(Some("http://a/wsdl"));
        f.endpoints.lock().remove("http://a/wsdl");
        assert!(f.selector.probe().is_none());
    }
}
