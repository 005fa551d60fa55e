//! RTP-Paketierung (RFC 3550, nur Sendepfad)
//!
//! ## Paketformat (Header = 12 Bytes, kein serde)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   0x80: Version 2, kein Padding, keine Extension, CC = 0
//!  1       1   Marker 0 + Payload-Type (7 Bit)
//!  2       2   Sequenznummer (big-endian)
//!  4       4   Zeitstempel (big-endian, 8 kHz-Ticks)
//!  8       4   SSRC (big-endian)
//! 12+      N   Nutzdaten (unveraendert)
//! ```
//!
//! Fehler beim Paketbau werden als `PacketError` zurueckgegeben, nie als
//! Panic: der Aufrufer laeuft im 20ms-Takt und verwirft lieber einen Frame.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// RTP-Version im Header
pub const RTP_VERSION: u8 = 2;

/// Byte 0 jedes gesendeten Pakets
pub const RTP_BYTE0: u8 = RTP_VERSION << 6;

/// Maximale Nutzdaten-Laenge (Ethernet-MTU minus IP/UDP/RTP-Header)
pub const MAX_NUTZDATEN_LAENGE: usize = 1460;

/// Fehler beim Bauen oder Lesen eines RTP-Pakets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("Ungueltige Sequenznummer: {0}")]
    Sequenz(i64),

    #[error("Ungueltiger Zeitstempel: {0}")]
    Zeitstempel(i64),

    #[error("Ungueltige SSRC: {0}")]
    Ssrc(i64),

    #[error("Ungueltiger Payload-Type: {0}")]
    PayloadType(u8),

    #[error("Keine Nutzdaten")]
    NutzdatenLeer,

    #[error("Nutzdaten zu lang: {0} Bytes (Maximum 1460)")]
    NutzdatenZuLang(usize),

    #[error("Paket zu kurz: {0} Bytes (erwartet mindestens 12)")]
    ZuKurz(usize),

    #[error("Ungueltige RTP-Version: {0}")]
    Version(u8),
}

// ---------------------------------------------------------------------------
// RtpHeader
// ---------------------------------------------------------------------------

/// 12-Byte RTP-Header einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Payload-Type (0..=127)
    pub payload_type: u8,
    /// Sequenznummer, +1 pro Paket, modulo 2^16
    pub sequence: u16,
    /// RTP-Zeitstempel, +160 pro Paket, modulo 2^32
    pub timestamp: u32,
    /// Synchronisation Source der Session
    pub ssrc: u32,
}

impl RtpHeader {
    /// Header-Groesse in Bytes
    pub const SIZE: usize = 12;

    /// Erstellt einen Header aus bereits typisierten Werten
    pub fn new(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            payload_type,
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Erstellt einen Header aus ungeprueften Rohwerten
    ///
    /// Fuer Werte, die nicht aus dem eigenen Session-Zustand stammen
    /// (z.B. JSON-Steuerdaten). Negative oder zu grosse Werte ergeben einen
    /// `PacketError` statt eines stillen Abschneidens.
    pub fn from_raw(
        payload_type: u8,
        sequence: i64,
        timestamp: i64,
        ssrc: i64,
    ) -> Result<Self, PacketError> {
        let sequence = u16::try_from(sequence).map_err(|_| PacketError::Sequenz(sequence))?;
        let timestamp =
            u32::try_from(timestamp).map_err(|_| PacketError::Zeitstempel(timestamp))?;
        let ssrc = u32::try_from(ssrc).map_err(|_| PacketError::Ssrc(ssrc))?;
        Ok(Self::new(payload_type, sequence, timestamp, ssrc))
    }

    /// Serialisiert den Header in ein 12-Byte-Array (big-endian)
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = RTP_BYTE0;
        buf[1] = self.payload_type & 0x7F;
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        buf
    }

    /// Liest einen Header aus einem empfangenen Datagramm
    ///
    /// Nur fuer Diagnose und Tests; die Engine selbst empfaengt nicht.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::ZuKurz(buf.len()));
        }

        let version = buf[0] >> 6;
        if version != RTP_VERSION {
            return Err(PacketError::Version(version));
        }

        Ok(Self {
            payload_type: buf[1] & 0x7F,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

// ---------------------------------------------------------------------------
// Paketbau
// ---------------------------------------------------------------------------

/// Baut ein vollstaendiges RTP-Paket (Header + Nutzdaten)
///
/// Die Laenge des Ergebnisses ist immer `12 + nutzdaten.len()`.
/// Sequenznummer und Zeitstempel werden hier nicht veraendert; das
/// Weiterzaehlen ist Sache des Schedulers, nachdem gesendet wurde.
pub fn create_rtp_packet(header: &RtpHeader, nutzdaten: &[u8]) -> Result<Bytes, PacketError> {
    if header.payload_type > 0x7F {
        return Err(PacketError::PayloadType(header.payload_type));
    }
    if nutzdaten.is_empty() {
        return Err(PacketError::NutzdatenLeer);
    }
    if nutzdaten.len() > MAX_NUTZDATEN_LAENGE {
        return Err(PacketError::NutzdatenZuLang(nutzdaten.len()));
    }

    let mut buf = BytesMut::with_capacity(RtpHeader::SIZE + nutzdaten.len());
    buf.put_slice(&header.encode());
    buf.put_slice(nutzdaten);
    Ok(buf.freeze())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
