//! Session Affinity Store Port
//!
//! Per-session storage of the connection a session was last routed to.
//! Owned by the request-handling layer; the selector only reads and writes the
//! binding of the current call.

use crate::domain::entities::{Binding, SessionKey};
use async_trait::async_trait;

/// Storage for session-to-endpoint bindings.
///
/// A binding is a back-reference: it never keeps an endpoint in rotation.
/// The selector discards bindings whose connection is no longer active.
#[async_trait]
pub trait SessionAffinityStore: Send + Sync {
    /// Get the binding for a session, if one exists.
    async fn get(&self, key: &SessionKey) -> Option<Binding>;

    /// Create or replace the binding for a session.
    async fn set(&self, key: SessionKey, binding: Binding);

    /// Remove the binding for a session.
    async fn remove(&self, key: &SessionKey);

    /// Update the last_seen timestamp of a binding.
    async fn touch(&self, key: &SessionKey);
}
