//! HTTP Service Connection
//!
//! Implements RemoteConnection over reqwest. Starting a connection fetches the
//! producer's service description document at the endpoint URL and learns the
//! protocol version from the namespace it declares.

use crate::domain::error::ConnectionError;
use crate::domain::ports::{ConsumerExtensionAccessor, Extension, ExtensionTarget, RemoteConnection};
use crate::domain::value_objects::ProtocolVersion;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Header prefix for request extensions sent with the description request.
pub const EXTENSION_HEADER_PREFIX: &str = "X-Consumer-Extension-";

#[derive(Debug, Default, Clone, Copy)]
struct DescriptionState {
    started: bool,
    protocol_version: Option<ProtocolVersion>,
}

/// Connection to one producer endpoint over HTTP(S).
pub struct HttpServiceConnection {
    url: String,
    client: reqwest::Client,
    extensions: Arc<dyn ConsumerExtensionAccessor>,
    state: Mutex<DescriptionState>,
    /// 0 disables the per-request timeout
    timeout_ms: AtomicU64,
    /// Message-level security flag. Only carried for the marshalling layer,
    /// which reads it through `transport_security_enabled`; the description
    /// fetch ignores it.
    transport_security: AtomicBool,
}

impl HttpServiceConnection {
    /// Create an unstarted connection to `url`.
    ///
    /// # Errors
    /// `ConnectionError::InvalidUrl` if `url` is not an absolute URL.
    pub fn new(
        url: impl Into<String>,
        extensions: Arc<dyn ConsumerExtensionAccessor>,
    ) -> Result<Self, ConnectionError> {
        let url = url.into();
        reqwest::Url::parse(&url).map_err(|e| ConnectionError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self::with_client(url, reqwest::Client::new(), extensions))
    }

    fn with_client(
        url: String,
        client: reqwest::Client,
        extensions: Arc<dyn ConsumerExtensionAccessor>,
    ) -> Self {
        Self {
            url,
            client,
            extensions,
            state: Mutex::new(DescriptionState::default()),
            timeout_ms: AtomicU64::new(0),
            transport_security: AtomicBool::new(false),
        }
    }

    /// Fetch the service description and detect the protocol version.
    async fn fetch_description(&self) -> Result<ProtocolVersion, ConnectionError> {
        let timeout_ms = self.operation_timeout_ms();

        let mut request = self.client.get(&self.url);
        if timeout_ms > 0 {
            request = request.timeout(Duration::from_millis(timeout_ms));
        }
        for extension in self
            .extensions
            .request_extensions_for(ExtensionTarget::ServiceDescription)
        {
            request = request.header(
                format!("{}{}", EXTENSION_HEADER_PREFIX, extension.name),
                extension.value,
            );
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.request_error(e, timeout_ms))?;

        if !response.status().is_success() {
            return Err(ConnectionError::Unreachable(format!(
                "{} answered {}",
                self.url,
                response.status()
            )));
        }

        if let Some(server) = response
            .headers()
            .get(reqwest::header::SERVER)
            .and_then(|v| v.to_str().ok())
        {
            self.extensions.add_response_extension(
                ExtensionTarget::ServiceDescription,
                Extension::new("Server", server),
            );
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(e, timeout_ms))?;

        ProtocolVersion::detect(&body).ok_or_else(|| {
            ConnectionError::InvalidDescription(format!(
                "{} declares no known protocol namespace",
                self.url
            ))
        })
    }

    fn request_error(&self, e: reqwest::Error, timeout_ms: u64) -> ConnectionError {
        if e.is_timeout() {
            ConnectionError::Timeout(timeout_ms)
        } else {
            ConnectionError::Unreachable(format!("{}: {}", self.url, e))
        }
    }

    async fn load(&self) -> Result<(), ConnectionError> {
        match self.fetch_description().await {
            Ok(version) => {
                *self.state.lock() = DescriptionState {
                    started: true,
                    protocol_version: Some(version),
                };
                tracing::debug!("{} speaks protocol {}", self.url, version);
                Ok(())
            }
            Err(e) => {
                self.state.lock().started = false;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RemoteConnection for HttpServiceConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn start(&self) -> Result<(), ConnectionError> {
        if self.is_available() {
            return Ok(());
        }
        self.load().await
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
        self.state.lock().started = false;
        Ok(())
    }

    async fn refresh(&self, force: bool) -> Result<bool, ConnectionError> {
        if !force && self.is_available() {
            return Ok(false);
        }
        self.load().await?;
        Ok(true)
    }

    fn is_available(&self) -> bool {
        self.state.lock().started
    }

    fn set_operation_timeout_ms(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    fn operation_timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::Relaxed)
    }

    fn set_transport_security(&self, enabled: bool) {
        self.transport_security.store(enabled, Ordering::Relaxed);
    }

    fn transport_security_enabled(&self) -> bool {
        self.transport_security.load(Ordering::Relaxed)
    }

    fn is_transport_security_available(&self) -> bool {
        self.url.starts_with("https://")
    }

    fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.state.lock().protocol_version
    }

    fn clone_for(&self, url: &str) -> Arc<dyn RemoteConnection> {
        let connection =
            Self::with_client(url.to_string(), self.client.clone(), self.extensions.clone());
        connection.set_operation_timeout_ms(self.operation_timeout_ms());
        connection.set_transport_security(self.transport_security_enabled());
        Arc::new(connection)
    }
}
