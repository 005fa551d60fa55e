//! Gemeinsame Identifikationstypen fuer Callstream
//!
//! Call-IDs werden vom Aufrufer (Dialplan-Bridge) vergeben und sind daher
//! Strings, keine UUIDs. Das Newtype-Pattern verhindert Verwechslungen mit
//! anderen String-Werten wie Hostnamen oder Channel-Referenzen.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Eindeutige, vom Aufrufer vergebene Call-ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Erstellt eine neue CallId (ohne Validierung)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True wenn die ID leer ist oder nur aus Leerzeichen besteht
    pub fn ist_leer(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for CallId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_id_anzeige() {
        let id = CallId::from("call-1");
        assert_eq!(id.to_string(), "call-1");
        assert_eq!(id.as_str(), "call-1");
    }

    #[test]
    fn leere_call_id() {
        assert!(CallId::from("").ist_leer());
        assert!(CallId::from("   ").ist_leer());
        assert!(!CallId::from("a").ist_leer());
    }

    #[test]
    fn call_id_ist_transparent_serialisiert() {
        let json = serde_json::to_string(&CallId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
