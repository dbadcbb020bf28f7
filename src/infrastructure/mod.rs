//! Infrastructure Layer
//!
//! Timers and process-level concerns.

pub mod recovery_scheduler;
pub mod shutdown;

pub use recovery_scheduler::{RecoveryScheduler, DEFAULT_COOLDOWN};
pub use shutdown::{shutdown_signal, ShutdownController};
