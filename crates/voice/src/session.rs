//! Zustand einer einzelnen Call-Session
//!
//! Der veraenderliche Teil (Puffer, Sequenznummer, Zeitstempel) liegt hinter
//! einem `parking_lot::Mutex`. `send_audio` und der Scheduler-Takt sind die
//! einzigen Schreiber; der Lock serialisiert Anhaengen und Entnehmen, damit
//! nie ein halb angehaengter Chunk gesendet wird. Sessions teilen keinen
//! veraenderlichen Zustand miteinander.

use crate::buffer::AudioFrameBuffer;
use crate::config::CallConfig;
use crate::stats::{CallStats, CallStatsSnapshot};
use callstream_core::CallId;
use callstream_protocol::{AudioFormat, SAMPLES_PER_FRAME};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lebenszyklus einer Session: Aufbau -> Aktiv -> Schliessend -> Geschlossen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionPhase {
    Aufbau = 0,
    Aktiv = 1,
    Schliessend = 2,
    Geschlossen = 3,
}

impl SessionPhase {
    fn from_u8(wert: u8) -> Self {
        match wert {
            0 => Self::Aufbau,
            1 => Self::Aktiv,
            2 => Self::Schliessend,
            _ => Self::Geschlossen,
        }
    }
}

// ---------------------------------------------------------------------------
// RTP-Zustand
// ---------------------------------------------------------------------------

/// Veraenderlicher Teil einer Session (unter Mutex)
#[derive(Debug)]
pub struct SessionZustand {
    pub puffer: AudioFrameBuffer,
    /// Sequenznummer des naechsten Pakets
    pub sequence: u16,
    /// RTP-Zeitstempel des naechsten Pakets
    pub timestamp: u32,
}

impl SessionZustand {
    /// Zaehlt nach einem Sendeversuch weiter: +1 Sequenz, +160 Zeitstempel
    pub fn weiterzaehlen(&mut self) {
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(SAMPLES_PER_FRAME as u32);
    }
}

// ---------------------------------------------------------------------------
// CallSession
// ---------------------------------------------------------------------------

/// Eine aktive Call-Session
#[derive(Debug)]
pub struct CallSession {
    pub call_id: CallId,
    pub config: CallConfig,
    /// Aufgeloeste Zieladresse
    pub ziel: SocketAddr,
    /// Konstant fuer die gesamte Lebensdauer der Session
    pub ssrc: u32,
    pub stats: Arc<CallStats>,
    zustand: Mutex<SessionZustand>,
    phase: AtomicU8,
    erstellt: Instant,
}

impl CallSession {
    /// Erstellt eine Session in Phase `Aufbau` mit zufaelliger SSRC,
    /// Start-Sequenznummer und Start-Zeitstempel
    pub fn neu(call_id: CallId, config: CallConfig, ziel: SocketAddr) -> Self {
        Self::mit_startwerten(call_id, config, ziel, rand::random(), rand::random(), rand::random())
    }

    /// Erstellt eine Session mit festen Startwerten
    pub fn mit_startwerten(
        call_id: CallId,
        config: CallConfig,
        ziel: SocketAddr,
        ssrc: u32,
        sequence: u16,
        timestamp: u32,
    ) -> Self {
        let puffer = AudioFrameBuffer::neu(config.format);
        Self {
            call_id,
            config,
            ziel,
            ssrc,
            stats: Arc::new(CallStats::neu()),
            zustand: Mutex::new(SessionZustand {
                puffer,
                sequence,
                timestamp,
            }),
            phase: AtomicU8::new(SessionPhase::Aufbau as u8),
            erstellt: Instant::now(),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.config.format
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn phase_setzen(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn ist_aktiv(&self) -> bool {
        self.phase() == SessionPhase::Aktiv
    }

    /// Fuehrt `f` unter dem Session-Lock aus
    pub fn mit_zustand<R>(&self, f: impl FnOnce(&mut SessionZustand) -> R) -> R {
        f(&mut self.zustand.lock())
    }

    /// Haengt Audio an den Puffer an; gibt die Anzahl neu gepufferter Bytes zurueck
    pub fn audio_anhaengen(&self, chunk: &[u8]) -> usize {
        self.stats.audio_empfangen(chunk.len());
        self.mit_zustand(|z| z.puffer.anhaengen(chunk))
    }

    /// Lesbarer Schnappschuss fuer `status()`
    pub fn snapshot(&self) -> CallSnapshot {
        let (gepufferte_bytes, sequence, timestamp) =
            self.mit_zustand(|z| (z.puffer.len(), z.sequence, z.timestamp));

        CallSnapshot {
            call_id: self.call_id.clone(),
            remote_host: self.config.remote_host.clone(),
            remote_port: self.ziel.port(),
            ziel: self.ziel.to_string(),
            format: self.config.format,
            channel_ref: self.config.channel_ref.clone(),
            ssrc: self.ssrc,
            sequence,
            timestamp,
            gepufferte_bytes,
            phase: self.phase(),
            alter_sekunden: self.erstellt.elapsed().as_secs(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Status einer Session fuer Monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub call_id: CallId,
    pub remote_host: String,
    pub remote_port: u16,
    pub ziel: String,
    pub format: AudioFormat,
    pub channel_ref: Option<String>,
    pub ssrc: u32,
    pub sequence: u16,
    pub timestamp: u32,
    pub gepufferte_bytes: usize,
    pub phase: SessionPhase,
    pub alter_sekunden: u64,
    pub stats: CallStatsSnapshot,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
