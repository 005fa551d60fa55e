//! Prometheus-kompatible Metriken fuer Callstream
//!
//! Registrierte Metriken:
//! - `callstream_active_calls` – Gauge: Aktuell aktive Calls
//! - `callstream_calls_total` – Gauge: Seit Prozessstart angelegte Calls
//! - `callstream_packets_sent_total` – Gauge: Erfolgreich gesendete RTP-Pakete
//! - `callstream_bytes_sent_total` – Gauge: Gesendete Bytes inkl. RTP-Header
//! - `callstream_errors_total` – Gauge: Sende- und Warteschlangenfehler
//! - `callstream_uptime_seconds` – Gauge: Laufzeit der Engine
//! - `callstream_shutting_down` – Gauge: 1 waehrend der Abschaltung
//!
//! Die Werte werden nicht doppelt gezaehlt: der `StatsCollector` der Engine
//! bleibt die einzige Quelle, beim Scrape wird sein Schnappschuss gespiegelt.

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use callstream_voice::{CallSessionRegistry, EngineStatus};
use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Callstream-Prometheus-Metriken
#[derive(Clone)]
pub struct StreamMetrics {
    pub registry: Arc<Registry>,

    pub active_calls: IntGauge,
    pub calls_total: IntGauge,
    pub packets_sent_total: IntGauge,
    pub bytes_sent_total: IntGauge,
    pub errors_total: IntGauge,
    pub uptime_seconds: IntGauge,
    pub shutting_down: IntGauge,
}

fn gauge(registry: &Registry, name: &str, hilfe: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl StreamMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let active_calls = gauge(&registry, "callstream_active_calls", "Anzahl aktiver Calls")?;
        let calls_total = gauge(
            &registry,
            "callstream_calls_total",
            "Seit Prozessstart angelegte Calls",
        )?;
        let packets_sent_total = gauge(
            &registry,
            "callstream_packets_sent_total",
            "Erfolgreich gesendete RTP-Pakete",
        )?;
        let bytes_sent_total = gauge(
            &registry,
            "callstream_bytes_sent_total",
            "Gesendete Bytes inklusive RTP-Header",
        )?;
        let errors_total = gauge(
            &registry,
            "callstream_errors_total",
            "Sende- und Warteschlangenfehler",
        )?;
        let uptime_seconds = gauge(
            &registry,
            "callstream_uptime_seconds",
            "Laufzeit der Engine in Sekunden",
        )?;
        let shutting_down = gauge(
            &registry,
            "callstream_shutting_down",
            "1 waehrend die Engine herunterfaehrt",
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            active_calls,
            calls_total,
            packets_sent_total,
            bytes_sent_total,
            errors_total,
            uptime_seconds,
            shutting_down,
        })
    }

    /// Spiegelt einen Engine-Schnappschuss in die Gauges
    pub fn aktualisieren(&self, status: &EngineStatus) {
        let global = &status.global;
        self.active_calls.set(status.active_calls_count as i64);
        self.calls_total.set(global.total_calls as i64);
        self.packets_sent_total.set(global.total_packets_sent as i64);
        self.bytes_sent_total.set(global.total_bytes_sent as i64);
        self.errors_total.set(global.total_errors as i64);
        self.uptime_seconds.set(global.uptime_seconds as i64);
        self.shutting_down.set(i64::from(status.is_shutting_down));
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[derive(Clone)]
struct MetricsState {
    metriken: StreamMetrics,
    engine: CallSessionRegistry,
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(engine: CallSessionRegistry) -> Result<Router> {
    let metriken = StreamMetrics::neu()?;
    Ok(Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { metriken, engine }))
}

async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    state.metriken.aktualisieren(&state.engine.status());

    match state.metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
