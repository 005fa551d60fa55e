//! Konfiguration der Engine und einzelner Calls

use callstream_core::{CallId, CallstreamError, Result};
use callstream_protocol::{AudioFormat, FRAME_SIZE_MS};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Konfiguration fuer die gesamte Engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lokale Adresse, an die die Call-Sockets gebunden werden (Port immer 0)
    pub lokale_adresse: IpAddr,
    /// Takt des Frame-Schedulers
    pub frame_intervall: Duration,
    /// Groesse der Sende-Queue pro Call (Pakete)
    pub send_queue_groesse: usize,
    /// Kapazitaet des Ereignis-Broadcast-Kanals
    pub event_kanal_groesse: usize,
}

impl EngineConfig {
    /// Erstellt eine Konfiguration mit Standard-Werten
    pub fn neu() -> Self {
        Self {
            lokale_adresse: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            frame_intervall: Duration::from_millis(FRAME_SIZE_MS),
            send_queue_groesse: 64,
            event_kanal_groesse: 256,
        }
    }

    /// Prueft die Werte auf Plausibilitaet
    pub fn validieren(&self) -> Result<()> {
        if self.frame_intervall.is_zero() {
            return Err(CallstreamError::Konfiguration(
                "frame_intervall muss > 0 sein".into(),
            ));
        }
        if self.send_queue_groesse == 0 {
            return Err(CallstreamError::Konfiguration(
                "send_queue_groesse muss > 0 sein".into(),
            ));
        }
        if self.event_kanal_groesse == 0 {
            return Err(CallstreamError::Konfiguration(
                "event_kanal_groesse muss > 0 sein".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// CallConfig
// ---------------------------------------------------------------------------

/// Vom Dialplan-Bridge gelieferte Parameter eines Calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    /// Ziel-Host (IP-Literal oder DNS-Name)
    pub remote_host: String,
    /// Ziel-Port; breiter als u16, damit 0 und >65535 als Fehler erkennbar bleiben
    pub remote_port: u32,
    /// Audioformat (bestimmt Payload-Type)
    #[serde(default)]
    pub format: AudioFormat,
    /// Referenz auf den Asterisk-Channel (nur informativ)
    #[serde(default)]
    pub channel_ref: Option<String>,
}

impl CallConfig {
    /// Erstellt eine Call-Konfiguration ohne Channel-Referenz
    pub fn neu(remote_host: impl Into<String>, remote_port: u32, format: AudioFormat) -> Self {
        Self {
            remote_host: remote_host.into(),
            remote_port,
            format,
            channel_ref: None,
        }
    }

    /// Setzt die Channel-Referenz
    pub fn mit_channel_ref(mut self, channel_ref: impl Into<String>) -> Self {
        self.channel_ref = Some(channel_ref.into());
        self
    }

    /// Validiert Call-ID und Konfiguration und gibt den Port als u16 zurueck
    pub fn validieren(&self, call_id: &CallId) -> Result<u16> {
        if call_id.ist_leer() {
            return Err(CallstreamError::validierung("callId darf nicht leer sein"));
        }
        if self.remote_host.trim().is_empty() {
            return Err(CallstreamError::validierung(format!(
                "remoteHost fehlt fuer Call '{call_id}'"
            )));
        }
        match u16::try_from(self.remote_port) {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(CallstreamError::validierung(format!(
                "remotePort {} ausserhalb von 1..=65535 fuer Call '{call_id}'",
                self.remote_port
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = EngineConfig::neu();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.frame_intervall, Duration::from_millis(20));
    }

    #[test]
    fn null_werte_werden_abgelehnt() {
        let mut cfg = EngineConfig::neu();
        cfg.send_queue_groesse = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = EngineConfig::neu();
        cfg.frame_intervall = Duration::ZERO;
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn port_grenzen() {
        let id = CallId::from("call-1");
        assert!(CallConfig::neu("127.0.0.1", 0, AudioFormat::Ulaw)
            .validieren(&id)
            .is_err());
        assert!(CallConfig::neu("127.0.0.1", 65_536, AudioFormat::Ulaw)
            .validieren(&id)
            .is_err());
        assert_eq!(
            CallConfig::neu("127.0.0.1", 1, AudioFormat::Ulaw).validieren(&id).unwrap(),
            1
        );
        assert_eq!(
            CallConfig::neu("127.0.0.1", 65_535, AudioFormat::Ulaw)
                .validieren(&id)
                .unwrap(),
            65_535
        );
    }

    #[test]
    fn leere_call_id_und_host() {
        let cfg = CallConfig::neu("127.0.0.1", 5000, AudioFormat::Ulaw);
        let e = cfg.validieren(&CallId::from("")).unwrap_err();
        assert!(e.ist_validierung());

        let cfg = CallConfig::neu("  ", 5000, AudioFormat::Ulaw);
        assert!(cfg.validieren(&CallId::from("call-1")).unwrap_err().ist_validierung());
    }

    #[test]
    fn call_config_aus_json() {
        let json = r#"{"remote_host":"10.0.0.5","remote_port":4000,"format":"slin","channel_ref":"PJSIP/42"}"#;
        let cfg: CallConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.format, AudioFormat::Slin);
        assert_eq!(cfg.channel_ref.as_deref(), Some("PJSIP/42"));

        // Format fehlt -> ulaw
        let cfg: CallConfig =
            serde_json::from_str(r#"{"remote_host":"h","remote_port":1}"#).unwrap();
        assert_eq!(cfg.format, AudioFormat::Ulaw);
    }
}
