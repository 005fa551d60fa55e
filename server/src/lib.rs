//! callstream-server – Bibliotheks-Root
//!
//! Verbindet Engine, Ereignis-Monitor und Observability-Server zu einem
//! lauffaehigen Prozess.

pub mod config;

use anyhow::Result;
use callstream_core::StreamEvent;
use callstream_voice::{CallSessionRegistry, EngineConfig};
use config::ServerConfig;
use tokio::sync::broadcast;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    engine_config: EngineConfig,
}

impl Server {
    /// Erstellt einen neuen Server; ungueltige Engine-Werte werden hier abgelehnt
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let engine_config = config.engine_config()?;
        Ok(Self {
            config,
            engine_config,
        })
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Registry anlegen
    /// 2. Ereignis-Monitor starten
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. Auf Ctrl-C warten, dann alle Calls geordnet beenden
    pub async fn starten(self) -> Result<()> {
        let registry = CallSessionRegistry::neu(self.engine_config.clone());

        tracing::info!(
            bind = %self.engine_config.lokale_adresse,
            intervall_ms = self.engine_config.frame_intervall.as_millis() as u64,
            "Engine bereit"
        );

        let monitor = tokio::spawn(ereignisse_ueberwachen(registry.subscribe()));

        if self.config.observability.aktiviert {
            let addr = self.config.observability_bind_adresse()?;
            let obs_registry = registry.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    callstream_observability::observability_server_starten(addr, obs_registry).await
                {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Calls werden beendet");

        let beendet = registry.shutdown().await;
        tracing::info!(calls = beendet, "Alle Calls beendet");

        monitor.abort();
        Ok(())
    }
}

/// Loggt Socket-Fehler und Lebenszyklus-Ereignisse der Engine
async fn ereignisse_ueberwachen(mut events: broadcast::Receiver<StreamEvent>) {
    loop {
        match events.recv().await {
            Ok(StreamEvent::SocketFehler { call_id, fehler }) => {
                tracing::warn!(call_id = %call_id, fehler = %fehler, "Socket-Fehler");
            }
            Ok(event) => {
                tracing::debug!(call_id = %event.call_id(), ?event, "Engine-Ereignis");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(verpasst = n, "Ereignis-Monitor hinkt hinterher");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
