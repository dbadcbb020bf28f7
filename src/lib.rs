//! producer-endpoints Library
//!
//! Failover and load balancing across the URLs of one remote portlet
//! producer: round-robin selection with session affinity, removal of
//! endpoints that fail to start and their timed return to rotation.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use adapters::outbound::{DashMapExtensionAccessor, DashMapSessionStore, HttpServiceConnection};
pub use application::{EndpointManager, EndpointStatus};
pub use config::load_config;
pub use domain::entities::{Binding, Endpoint, SessionKey};
pub use domain::error::{ConnectionError, EndpointError};
pub use domain::ports::{ConsumerExtensionAccessor, RemoteConnection, SessionAffinityStore};
pub use domain::value_objects::{EndpointUrls, ProtocolVersion, TrafficClass};
