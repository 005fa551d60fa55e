//! Fehlertypen fuer Callstream
//!
//! Zentraler Fehler-Enum fuer alle Fehler, die synchron an Aufrufer der
//! Engine gemeldet werden. Laufzeitfehler im Sendepfad landen nie hier,
//! sondern in Zaehlern und `StreamEvent`s.

use thiserror::Error;

/// Globaler Result-Alias fuer Callstream
pub type Result<T> = std::result::Result<T, CallstreamError>;

/// Alle synchron gemeldeten Fehler im Callstream-System
#[derive(Debug, Error)]
pub enum CallstreamError {
    // --- Eingaben ---
    #[error("Validierung fehlgeschlagen: {0}")]
    Validierung(String),

    // --- Netzwerk ---
    #[error("Socket-Fehler: {0}")]
    Socket(String),

    #[error("Host '{host}' nicht aufloesbar: {grund}")]
    Aufloesung { host: String, grund: String },

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl CallstreamError {
    /// Erstellt einen Validierungsfehler aus einer beliebigen Nachricht
    pub fn validierung(msg: impl Into<String>) -> Self {
        Self::Validierung(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler aus einer ungueltigen Eingabe stammt
    ///
    /// Bei Validierungsfehlern wurden keinerlei Ressourcen angelegt.
    pub fn ist_validierung(&self) -> bool {
        matches!(self, Self::Validierung(_))
    }
}

impl From<std::io::Error> for CallstreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Socket(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = CallstreamError::validierung("callId fehlt");
        assert_eq!(e.to_string(), "Validierung fehlgeschlagen: callId fehlt");
    }

    #[test]
    fn validierung_erkennung() {
        assert!(CallstreamError::validierung("x").ist_validierung());
        assert!(!CallstreamError::Socket("x".into()).ist_validierung());
        assert!(!CallstreamError::Konfiguration("x".into()).ist_validierung());
    }

    #[test]
    fn aufloesung_fehler_enthaelt_host() {
        let e = CallstreamError::Aufloesung {
            host: "pbx.invalid".into(),
            grund: "keine Adresse".into(),
        };
        assert!(e.to_string().contains("pbx.invalid"));
        assert!(e.to_string().contains("keine Adresse"));
    }

    #[test]
    fn io_fehler_wird_socket_fehler() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "belegt");
        let e: CallstreamError = io.into();
        assert!(matches!(e, CallstreamError::Socket(_)));
    }
}
