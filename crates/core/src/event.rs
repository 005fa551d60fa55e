//! Engine-Ereignisse
//!
//! Laufzeitfehler im Sendepfad werden nie an den Aufrufer geworfen, sondern
//! als Ereignis veroeffentlicht. Monitoring-Komponenten abonnieren diese
//! ueber den Broadcast-Kanal der Registry und entscheiden selbst, ob sie
//! eskalieren (z.B. den Call upstream beenden).

use crate::types::CallId;
use serde::{Deserialize, Serialize};

/// Alle Ereignisse, die die Engine veroeffentlicht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Eine Call-Session wurde angelegt und der Scheduler laeuft
    CallGestartet { call_id: CallId },
    /// Eine Call-Session wurde vollstaendig abgebaut
    CallBeendet { call_id: CallId },
    /// Fehler am Socket einer Session (Senden fehlgeschlagen, ICMP unreachable, ...)
    #[serde(rename = "socket_error")]
    SocketFehler { call_id: CallId, fehler: String },
    /// Der Sende-Task einer Session hat seinen Socket geschlossen
    SocketGeschlossen { call_id: CallId },
}

impl StreamEvent {
    /// Gibt die Call-ID zurueck, auf die sich das Ereignis bezieht
    pub fn call_id(&self) -> &CallId {
        match self {
            Self::CallGestartet { call_id }
            | Self::CallBeendet { call_id }
            | Self::SocketFehler { call_id, .. }
            | Self::SocketGeschlossen { call_id } => call_id,
        }
    }

    /// True fuer Fehler-Ereignisse
    pub fn ist_fehler(&self) -> bool {
        matches!(self, Self::SocketFehler { .. })
    }
}
