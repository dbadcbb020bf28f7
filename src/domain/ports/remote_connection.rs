//! Remote Connection Port
//!
//! Defines the interface to one producer endpoint. The wire marshalling layer
//! implements it; the endpoint manager only starts, stops and configures it.

use crate::domain::error::ConnectionError;
use crate::domain::value_objects::ProtocolVersion;
use async_trait::async_trait;
use std::sync::Arc;

/// A live or startable connection to a single endpoint URL.
///
/// Implementations are shared behind `Arc` between the endpoint set, session
/// bindings and in-flight requests, so setters take `&self` and use interior
/// mutability.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// URL this connection is bound to.
    fn url(&self) -> &str;

    /// Bring the connection up. Calling it on a started connection is cheap.
    async fn start(&self) -> Result<(), ConnectionError>;

    /// Tear the connection down.
    async fn stop(&self) -> Result<(), ConnectionError>;

    /// Re-read the producer's service description.
    ///
    /// Returns whether anything was refreshed. `force` refreshes even when
    /// the connection considers itself available.
    async fn refresh(&self, force: bool) -> Result<bool, ConnectionError>;

    /// Whether the connection is started and usable.
    fn is_available(&self) -> bool;

    fn set_operation_timeout_ms(&self, timeout_ms: u64);

    fn operation_timeout_ms(&self) -> u64;

    /// Request message-level security. The flag is stored for the marshalling
    /// layer and does not change how the connection is started.
    fn set_transport_security(&self, enabled: bool);

    fn transport_security_enabled(&self) -> bool;

    /// Whether the producer can be reached with transport-level security.
    fn is_transport_security_available(&self) -> bool;

    /// Protocol version learned on start, if any.
    fn protocol_version(&self) -> Option<ProtocolVersion>;

    /// Create a fresh, unstarted connection bound to `url`, using `self` as
    /// the prototype.
    fn clone_for(&self, url: &str) -> Arc<dyn RemoteConnection>;
}

/// Identity comparison for shared connections.
///
/// Compares data addresses only, so two handles to the same connection are
/// equal even if their vtable pointers differ across codegen units.
pub fn same_connection(a: &Arc<dyn RemoteConnection>, b: &Arc<dyn RemoteConnection>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
