//! Scripted connection used by unit tests.

use crate::domain::error::ConnectionError;
use crate::domain::ports::RemoteConnection;
use crate::domain::value_objects::ProtocolVersion;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Failure script and call counters shared by a prototype and all its clones.
#[derive(Default)]
pub(crate) struct Script {
    failing: HashSet<String>,
    starts: HashMap<String, usize>,
    stops: HashMap<String, usize>,
    created: HashMap<String, usize>,
}

pub(crate) struct ScriptedConnection {
    url: String,
    script: Arc<Mutex<Script>>,
    started: AtomicBool,
    timeout_ms: AtomicU64,
    secure: AtomicBool,
}

impl ScriptedConnection {
    pub(crate) fn prototype(url: &str) -> Arc<Self> {
        Arc::new(Self::with_script(url, Arc::new(Mutex::new(Script::default()))))
    }

    fn with_script(url: &str, script: Arc<Mutex<Script>>) -> Self {
        *script.lock().created.entry(url.to_string()).or_insert(0) += 1;
        Self {
            url: url.to_string(),
            script,
            started: AtomicBool::new(false),
            timeout_ms: AtomicU64::new(0),
            secure: AtomicBool::new(false),
        }
    }

    /// Make every connection bound to `url` fail to start and report unavailable.
    pub(crate) fn fail(&self, url: &str) {
        self.script.lock().failing.insert(url.to_string());
    }

    pub(crate) fn heal(&self, url: &str) {
        self.script.lock().failing.remove(url);
    }

    pub(crate) fn start_calls(&self, url: &str) -> usize {
        self.script.lock().starts.get(url).copied().unwrap_or(0)
    }

    pub(crate) fn stop_calls(&self, url: &str) -> usize {
        self.script.lock().stops.get(url).copied().unwrap_or(0)
    }

    /// Number of connections created for `url` (prototype included).
    pub(crate) fn created(&self, url: &str) -> usize {
        self.script.lock().created.get(url).copied().unwrap_or(0)
    }

    fn is_failing(&self) -> bool {
        self.script.lock().failing.contains(&self.url)
    }
}

#[async_trait]
impl RemoteConnection for ScriptedConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn start(&self) -> Result<(), ConnectionError> {
        *self
            .script
            .lock()
            .starts
            .entry(self.url.clone())
            .or_insert(0) += 1;
        if self.is_failing() {
            self.started.store(false, Ordering::SeqCst);
            return Err(ConnectionError::Unreachable(self.url.clone()));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ConnectionError> {
        *self
            .script
            .lock()
            .stops
            .entry(self.url.clone())
            .or_insert(0) += 1;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh(&self, force: bool) -> Result<bool, ConnectionError> {
        if force || !self.is_available() {
            self.start().await?;
            return Ok(true);
        }
        Ok(false)
    }

    fn is_available(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.is_failing()
    }

    fn set_operation_timeout_ms(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::SeqCst);
    }

    fn operation_timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::SeqCst)
    }

    fn set_transport_security(&self, enabled: bool) {
        self.secure.store(enabled, Ordering::SeqCst);
    }

    fn transport_security_enabled(&self) -> bool {
        self.secure.load(Ordering::SeqCst)
    }

    fn is_transport_security_available(&self) -> bool {
        self.url.starts_with("https://")
    }

    fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.started
            .load(Ordering::SeqCst)
            .then_some(ProtocolVersion::V2)
    }

    fn clone_for(&self, url: &str) -> Arc<dyn RemoteConnection> {
        Arc::new(Self::with_script(url, self.script.clone()))
    }
}
