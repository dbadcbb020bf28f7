use crate::domain::entities::{DEFAULT_OPERATION_TIMEOUT_MS, MAX_COOLDOWN};
use serde::Deserialize;

const DEFAULT_COOLDOWN_SECS: u64 = 60;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Endpoint settings
    pub endpoints: String,
    pub cooldown_secs: u64,
    pub operation_timeout_ms: i64,
    pub transport_security: bool,

    // Session affinity settings
    pub session_ttl_secs: u64,
    pub session_gc_interval_secs: u64,

    pub status_interval_secs: u64,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: String::new(),
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS as i64,
            transport_security: false,
            session_ttl_secs: 600,
            session_gc_interval_secs: 60,
            status_interval_secs: 30,
            debug: false,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let endpoints = std::env::var("PRODUCER_ENDPOINTS_URLS").unwrap_or_default();

    let cooldown_secs = cooldown_secs(std::env::var("PRODUCER_ENDPOINTS_COOLDOWN_SECS").ok());

    let operation_timeout_ms = std::env::var("PRODUCER_ENDPOINTS_TIMEOUT_MS")
        .unwrap_or_else(|_| DEFAULT_OPERATION_TIMEOUT_MS.to_string())
        .trim()
        .parse()
        .unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS as i64);

    let transport_security = std::env::var("PRODUCER_ENDPOINTS_WSS_ENABLED")
        .map(|v| is_enabled(&v))
        .unwrap_or(false);

    let session_ttl_secs = std::env::var("PRODUCER_ENDPOINTS_SESSION_TTL_SECS")
        .unwrap_or_else(|_| "600".to_string())
        .parse()
        .unwrap_or(600);

    let session_gc_interval_secs = std::env::var("PRODUCER_ENDPOINTS_SESSION_GC_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);

    let status_interval_secs = std::env::var("PRODUCER_ENDPOINTS_STATUS_INTERVAL_SECS")
        .unwrap_or_else(|_| "30".to_string())
        .parse()
        .unwrap_or(30);

    let debug = std::env::var("DEBUG").is_ok();

    Ok(Config {
        endpoints,
        cooldown_secs,
        operation_timeout_ms,
        transport_security,
        session_ttl_secs,
        session_gc_interval_secs,
        status_interval_secs,
        debug,
    })
}

/// Non-positive or unparsable values fall back to the default cooldown,
/// values above `MAX_COOLDOWN` are capped.
fn cooldown_secs(raw: Option<String>) -> u64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .map(|secs| (secs as u64).min(MAX_COOLDOWN.as_secs()))
        .unwrap_or(DEFAULT_COOLDOWN_SECS)
}

fn is_enabled(value: &str) -> bool {
    value == "1" || value.to_lowercase() == "true"
}
