//! Failure Handler
//!
//! Takes an endpoint whose connection failed to start out of rotation and
//! schedules its return.

use crate::domain::error::EndpointError;
use crate::domain::ports::RemoteConnection;
use crate::domain::services::SharedEndpointSet;
use crate::infrastructure::RecoveryScheduler;
use std::sync::Arc;

/// Removes failed endpoints and hands them to the recovery scheduler.
#[derive(Clone)]
pub struct FailureHandler {
    endpoints: SharedEndpointSet,
    scheduler: RecoveryScheduler,
}

impl FailureHandler {
    pub fn new(endpoints: SharedEndpointSet, scheduler: RecoveryScheduler) -> Self {
        Self {
            endpoints,
            scheduler,
        }
    }

    /// Handle a start failure of `connection`.
    ///
    /// The endpoint is removed only if `connection` is still the active
    /// connection for its URL, so a late report about a connection replaced
    /// by reconfiguration or already removed by a concurrent caller changes
    /// nothing. Recovery is scheduled before returning.
    ///
    /// # Errors
    /// `EndpointError::NoEndpointsAvailable` once no endpoint is left in
    /// rotation. The removal and its recovery still take place.
    pub fn on_start_failure(
        &self,
        connection: &Arc<dyn RemoteConnection>,
    ) -> Result<(), EndpointError> {
        let url = connection.url().to_string();

        let (removed, exhausted) = {
            let mut set = self.endpoints.lock();
            let removed = if set.is_current(&url, connection) {
                set.remove(&url)
            } else {
                None
            };
            let exhausted = set.is_configured() && set.is_empty();
            (removed, exhausted)
        };

        match removed {
            Some(removed) => {
                tracing::info!(
                    "removing endpoint {} from rotation after start failure, retrying it in {}s ({} left)",
                    url,
                    self.scheduler.cooldown().as_secs(),
                    removed.remaining
                );
                self.scheduler
                    .schedule(Arc::downgrade(&self.endpoints), removed);
            }
            None => {
                tracing::debug!("endpoint {} already out of rotation", url);
            }
        }

        if exhausted {
            tracing::warn!("no producer endpoint left in rotation");
            return Err(EndpointError::NoEndpointsAvailable);
        }
        Ok(())
    }
}
