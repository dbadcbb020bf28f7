//! Domain errors

/// Errors surfaced by the endpoint manager.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Endpoint string rejected; the previous configuration is kept.
    #[error("invalid endpoint configuration: {0}")]
    Configuration(String),

    /// A single endpoint could not be started.
    #[error("endpoint {url} failed to start: {source}")]
    EndpointStartFailure {
        url: String,
        #[source]
        source: ConnectionError,
    },

    /// Every configured endpoint has been removed from rotation.
    #[error("no producer endpoint is available")]
    NoEndpointsAvailable,

    /// Selection retried more often than there were endpoints.
    #[error("endpoint selection gave up after {attempts} attempts")]
    SelectionRetryExhausted { attempts: usize },

    /// `start()` could not bring up any endpoint.
    #[error("none of the {attempted} configured endpoints could be started")]
    StartupFailure { attempted: usize },
}

impl EndpointError {
    /// Whether the producer is unreachable as a whole, as opposed to a
    /// configuration mistake or a single recoverable endpoint failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NoEndpointsAvailable
                | Self::SelectionRetryExhausted { .. }
                | Self::StartupFailure { .. }
        )
    }
}

/// Errors reported by a remote connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("producer unreachable: {0}")]
    Unreachable(String),
    #[error("operation timed out after {0} ms")]
    Timeout(u64),
    #[error("invalid service description: {0}")]
    InvalidDescription(String),
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}
