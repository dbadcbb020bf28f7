//! Application Layer
//!
//! Orchestrates the endpoint set: routing calls, reacting to failures and
//! exposing the manager surface.

mod endpoint_manager;
mod failure_handler;
mod selector;

pub use endpoint_manager::{CoolingDown, EndpointManager, EndpointManagerBuilder, EndpointStatus};
pub use failure_handler::FailureHandler;
pub use selector::Selector;
