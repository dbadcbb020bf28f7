//! producer-endpoints - Producer failover monitor
//!
//! This is the composition root that wires together all the components.

use anyhow::Context;
use producer_endpoints::adapters::outbound::{
    DashMapExtensionAccessor, DashMapSessionStore, HttpServiceConnection,
};
use producer_endpoints::config::load_config;
use producer_endpoints::domain::ports::{ConsumerExtensionAccessor, RemoteConnection};
use producer_endpoints::infrastructure::{shutdown_signal, ShutdownController};
use producer_endpoints::{EndpointManager, EndpointUrls, SessionKey, TrafficClass};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let urls = EndpointUrls::parse(&cfg.endpoints)
        .context("PRODUCER_ENDPOINTS_URLS must list at least one producer URL")?;

    tracing::info!(
        "starting producer-endpoints with {} endpoint(s), cooldown={}s",
        urls.len(),
        cfg.cooldown_secs
    );

    // ===== COMPOSITION ROOT =====

    // 1. Outbound adapters
    let extensions: Arc<dyn ConsumerExtensionAccessor> = Arc::new(DashMapExtensionAccessor::new());
    let prototype: Arc<dyn RemoteConnection> =
        Arc::new(HttpServiceConnection::new(urls.first(), extensions)?);

    let sessions = DashMapSessionStore::new();
    sessions.start_gc(
        Duration::from_secs(cfg.session_ttl_secs),
        Duration::from_secs(cfg.session_gc_interval_secs),
    );

    // 2. Endpoint manager
    let manager = EndpointManager::builder(prototype)
        .cooldown(Duration::from_secs(cfg.cooldown_secs))
        .operation_timeout_ms(cfg.operation_timeout_ms)
        .transport_security(cfg.transport_security)
        .build();
    manager.set_endpoints(&cfg.endpoints)?;

    if let Err(e) = manager.start().await {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    tracing::info!(
        "producer ready: protocol={} load_balancing={} host={}",
        manager
            .protocol_version()
            .map(|v| v.as_str())
            .unwrap_or("unknown"),
        manager.is_load_balancing(),
        manager.remote_host_address().unwrap_or_default()
    );

    // 3. Status loop until shutdown
    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let monitor = SessionKey::generate();
    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.status_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                if let Err(e) = manager.refresh().await {
                    tracing::warn!("refresh failed: {}", e);
                }

                match manager.connection_for(TrafficClass::Anonymous, &sessions, &monitor).await {
                    Ok(connection) => tracing::debug!("monitor session routed to {}", connection.url()),
                    Err(e) => tracing::warn!("{}", e),
                }

                match serde_json::to_string(&manager.status()) {
                    Ok(status) => tracing::info!("endpoint status: {}", status),
                    Err(e) => tracing::warn!("failed to serialize endpoint status: {}", e),
                }
            }
        }
    }

    manager.stop().await;
    tracing::info!("producer-endpoints stopped");
    Ok(())
}
