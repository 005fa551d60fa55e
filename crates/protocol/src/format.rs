//! Audioformate und Frame-Konstanten
//!
//! Die Engine transcodiert nicht: das Format einer Session bestimmt nur den
//! RTP-Payload-Type und die Byte-Breite eines Frames.
//!
//! | Format | Payload-Type | Frame (20ms)     |
//! |--------|--------------|------------------|
//! | ulaw   | 0 (PCMU)     | 160 Bytes        |
//! | slin   | 11           | 160 Bytes        |
//!
//! Payload-Type 11 fuer slin ist eine private Konvention mit der
//! Telefonie-Gegenstelle (8 kHz mono, 16 Bit). RFC 3551 ordnet PT 11 L16
//! 44.1 kHz stereo zu; der Wert muss fuer Wire-Kompatibilitaet trotzdem
//! 11 bleiben.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Abtastrate aller Sessions
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Dauer eines Frames in Millisekunden
pub const FRAME_SIZE_MS: u64 = 20;

/// Samples pro Frame (20ms bei 8 kHz); zugleich RTP-Zeitstempel-Schritt
/// und Frame-Breite in Bytes
pub const SAMPLES_PER_FRAME: usize = 160;

/// Codec-Auswahl einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// G.711 µ-law, 1 Byte pro Sample
    Ulaw,
    /// Signed linear 16 Bit, 8 kHz mono
    Slin,
}

impl AudioFormat {
    /// RTP-Payload-Type fuer Byte 1 des Headers
    pub fn payload_type(&self) -> u8 {
        match self {
            Self::Ulaw => 0,
            Self::Slin => 11,
        }
    }

    /// Anzahl Payload-Bytes pro gesendetem Frame
    pub fn frame_bytes(&self) -> usize {
        SAMPLES_PER_FRAME
    }

    /// Name wie er in Konfiguration und Status erscheint
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ulaw => "ulaw",
            Self::Slin => "slin",
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::Ulaw
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ulaw" | "pcmu" => Ok(Self::Ulaw),
            "slin" => Ok(Self::Slin),
            anderes => Err(format!("Unbekanntes Audioformat: '{anderes}'")),
        }
    }
}
