//! Adapters
//!
//! Implementations of the domain ports.

pub mod outbound;
