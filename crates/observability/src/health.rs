//! Health- und Status-Endpunkte
//!
//! - `GET /health` – `HealthCheck` als JSON; HTTP 503 sobald die Engine
//!   herunterfaehrt, damit die Orchestrierung keinen neuen Call mehr zuweist
//! - `GET /status` – `EngineStatus` mit allen aktiven Calls (nur lesend)

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use callstream_voice::CallSessionRegistry;

/// Axum-Router fuer `/health` und `/status`
pub fn health_router(registry: CallSessionRegistry) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(registry)
}

/// `GET /health` – gibt den Engine-Zustand zurueck
async fn health_handler(State(registry): State<CallSessionRegistry>) -> impl IntoResponse {
    let health = registry.health_check();
    let http_status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (http_status, Json(health))
}

/// `GET /status` – globale Zaehler und alle aktiven Calls
async fn status_handler(State(registry): State<CallSessionRegistry>) -> impl IntoResponse {
    Json(registry.status())
}
