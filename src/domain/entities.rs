//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of endpoint management:
//! configured endpoints, session bindings and cooldown timers.

use crate::domain::ports::RemoteConnection;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Operation timeout applied when none (or a negative one) is configured.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;

/// One configured producer connection point.
///
/// The endpoint set owns it while active; a cooldown timer owns it while it
/// is out of rotation. It is moved between the two, never duplicated.
#[derive(Clone)]
pub struct Endpoint {
    /// Unique key within the active set
    pub url: String,
    /// Connection bound to `url`
    pub connection: Arc<dyn RemoteConnection>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, connection: Arc<dyn RemoteConnection>) -> Self {
        Self {
            url: url.into(),
            connection,
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("available", &self.connection.is_available())
            .finish()
    }
}

/// Key identifying a caller session for affinity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random key for callers without a session of their own.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-to-endpoint binding for affinity.
///
/// Holds a handle to the connection the session was routed to. The handle
/// does not keep the endpoint in rotation: once the endpoint leaves the
/// active set the binding is stale and gets discarded.
#[derive(Clone)]
pub struct Binding {
    /// URL of the endpoint this session is bound to
    pub url: String,
    /// Connection the session was routed to
    pub connection: Arc<dyn RemoteConnection>,
    /// When the binding was created
    pub created_at: Instant,
    /// Last time this binding was used
    pub last_seen: Instant,
}

impl Binding {
    pub fn new(url: impl Into<String>, connection: Arc<dyn RemoteConnection>) -> Self {
        let now = Instant::now();
        Self {
            url: url.into(),
            connection,
            created_at: now,
            last_seen: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("url", &self.url)
            .field("created_at", &self.created_at)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

/// Cross-cutting settings shared by every connection of one manager.
///
/// Stored once on the endpoint set and applied whenever a connection enters
/// rotation: on configuration, on a setter call and on reinsertion after a
/// cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub operation_timeout_ms: u64,
    pub transport_security: bool,
}

impl ConnectionSettings {
    /// Negative timeouts fall back to the default.
    pub fn normalize_timeout(timeout_ms: i64) -> u64 {
        u64::try_from(timeout_ms).unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS)
    }

    pub fn apply_to(&self, connection: &dyn RemoteConnection) {
        connection.set_operation_timeout_ms(self.operation_timeout_ms);
        connection.set_transport_security(self.transport_security);
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            transport_security: false,
        }
    }
}

/// Longest cooldown honoured; anything above waits this long instead.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Pending re-insertion of a removed endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CooldownTimer {
    /// When the endpoint left rotation
    pub removed_at: tokio::time::Instant,
    /// Delay before it is put back
    pub reinsert_after: Duration,
}

impl CooldownTimer {
    pub fn new(reinsert_after: Duration) -> Self {
        Self {
            removed_at: tokio::time::Instant::now(),
            reinsert_after: reinsert_after.min(MAX_COOLDOWN),
        }
    }

    pub fn deadline(&self) -> tokio::time::Instant {
        self.removed_at
            .checked_add(self.reinsert_after)
            .or_else(|| self.removed_at.checked_add(MAX_COOLDOWN))
            .unwrap_or(self.removed_at)
    }

    pub fn remaining(&self) -> Duration {
        self.deadline()
            .saturating_duration_since(tokio::time::Instant::now())
    }
}
