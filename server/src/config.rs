//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::Context;
use callstream_observability::logging::{log_format_gueltig, log_level_gueltig};
use callstream_voice::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Engine-Einstellungen (Sockets, Takt, Queues)
    pub engine: EngineEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health, Status)
    pub observability: ObservabilityEinstellungen,
}

/// Engine-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineEinstellungen {
    /// Lokale Adresse fuer die Call-Sockets (Port wird pro Call vergeben)
    pub bind_adresse: String,
    /// Frame-Takt in Millisekunden
    pub frame_intervall_ms: u64,
    /// Sende-Queue pro Call in Paketen
    pub send_queue_groesse: usize,
    /// Kapazitaet des Ereignis-Kanals
    pub event_kanal_groesse: usize,
}

impl Default for EngineEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            frame_intervall_ms: 20,
            send_queue_groesse: 64,
            event_kanal_groesse: 256,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    /// (Direktiven mit Targets nur ueber `CS_LOG_LEVEL`)
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Bind-Adresse des HTTP-Servers
    pub bind_adresse: String,
    /// Port fuer Metriken, Health und Status (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            bind_adresse: "127.0.0.1".into(),
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    ///
    /// Gibt `None` zurueck wenn die Datei nicht existiert; der Aufrufer
    /// verwendet dann die Standardwerte und meldet das nach dem Logging-Start.
    pub fn laden(pfad: &str) -> anyhow::Result<Option<Self>> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.logging_pruefen()?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    fn logging_pruefen(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiges Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format '{}'", self.logging.format);
        }
        Ok(())
    }

    /// Typisierte Engine-Konfiguration fuer die Registry
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let lokale_adresse: IpAddr = self
            .engine
            .bind_adresse
            .parse()
            .with_context(|| format!("Ungueltige Engine-Bind-Adresse '{}'", self.engine.bind_adresse))?;

        let config = EngineConfig {
            lokale_adresse,
            frame_intervall: Duration::from_millis(self.engine.frame_intervall_ms),
            send_queue_groesse: self.engine.send_queue_groesse,
            event_kanal_groesse: self.engine.event_kanal_groesse,
        };
        config.validieren()?;
        Ok(config)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self.observability.bind_adresse.parse().with_context(|| {
            format!(
                "Ungueltige Observability-Bind-Adresse '{}'",
                self.observability.bind_adresse
            )
        })?;
        Ok(SocketAddr::new(ip, self.observability.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.engine.frame_intervall_ms, 20);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.observability.aktiviert);

        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.frame_intervall, Duration::from_millis(20));
        assert_eq!(engine.send_queue_groesse, 64);
    }

    #[test]
    fn observability_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(
            cfg.observability_bind_adresse().unwrap(),
            "127.0.0.1:9300".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [engine]
            bind_adresse = "127.0.0.1"
            frame_intervall_ms = 10

            [observability]
            port = 9400
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.engine.frame_intervall_ms, 10);
        assert_eq!(cfg.observability.port, 9400);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.engine.send_queue_groesse, 64);
        assert_eq!(cfg.logging.format, "text");

        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.lokale_adresse.to_string(), "127.0.0.1");
    }

    #[test]
    fn ungueltige_engine_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.engine.frame_intervall_ms = 0;
        assert!(cfg.engine_config().is_err());

        let mut cfg = ServerConfig::default();
        cfg.engine.bind_adresse = "kein-ip".into();
        assert!(cfg.engine_config().is_err());
    }

    #[test]
    fn ungueltiges_log_level_wird_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.logging_pruefen().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_none() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/callstream.toml").unwrap();
        assert!(cfg.is_none());
    }

    #[test]
    fn datei_wird_geladen_und_geprueft() {
        let pfad = std::env::temp_dir().join(format!("callstream-test-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[engine]\nsend_queue_groesse = 8\n").unwrap();
        let cfg = ServerConfig::laden(pfad.to_str().unwrap()).unwrap().unwrap();
        assert_eq!(cfg.engine.send_queue_groesse, 8);

        std::fs::write(&pfad, "[logging]\nlevel = \"verbose\"\n").unwrap();
        assert!(ServerConfig::laden(pfad.to_str().unwrap()).is_err());
        std::fs::remove_file(&pfad).unwrap();
    }
}
