//! # callstream-observability
//!
//! Observability-Crate fuer Callstream:
//! - Health-Check-Endpunkt (`/health`) fuer Readiness/Liveness-Probes
//! - Status-Endpunkt (`/status`) mit allen aktiven Calls
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Structured Logging via tracing-subscriber

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::health_router;
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, StreamMetrics};

use anyhow::Result;
use axum::Router;
use callstream_voice::CallSessionRegistry;
use std::net::SocketAddr;

/// Baut den vollstaendigen Observability-Router fuer eine Registry
pub fn observability_router(registry: CallSessionRegistry) -> Result<Router> {
    Ok(Router::new()
        .merge(health_router(registry.clone()))
        .merge(metrics_router(registry)?)
        .layer(tower_http::trace::TraceLayer::new_for_http()))
}

/// Startet den Observability-HTTP-Server (Health, Status, Metriken)
///
/// Endpunkte:
/// - `GET /health`  – Health-Check JSON (503 waehrend der Abschaltung)
/// - `GET /status`  – Globale Zaehler und alle aktiven Calls
/// - `GET /metrics` – Prometheus scrape format
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    registry: CallSessionRegistry,
) -> Result<()> {
    let app = observability_router(registry)?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");

    axum::serve(listener, app).await?;
    Ok(())
}
