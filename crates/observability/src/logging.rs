//! Structured Logging Setup via tracing-subscriber
//!
//! Die Konfigurationsdatei setzt nur ein einfaches Level
//! (trace/debug/info/warn/error, siehe [`log_level_gueltig`]) und das Format.
//! Per Umgebungsvariable laesst sich beides uebersteuern:
//! - `CS_LOG_LEVEL`: vollstaendige EnvFilter-Direktive,
//!   z.B. `callstream_voice=trace,info`
//! - `CS_LOG_FORMAT`: Format (text/json)
//!
//! Die Engine loggt Call-IDs als strukturiertes Feld `call_id`; im
//! JSON-Format lassen sich so alle Ereignisse eines Calls filtern.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// `level` ist ein bereits validiertes Level aus der Konfiguration;
/// `CS_LOG_LEVEL` und `CS_LOG_FORMAT` haben Vorrang. Darf nur einmal pro
/// Prozess aufgerufen werden.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("CS_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var("CS_LOG_FORMAT").unwrap_or_else(|_| format.to_string());

    match format_env.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Validiert ein Level aus der Konfigurationsdatei.
///
/// Direktiven mit Targets sind nur ueber `CS_LOG_LEVEL` moeglich.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
