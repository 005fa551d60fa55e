//! Zaehler pro Call und global
//!
//! Alle Zaehler sind Atomics: sie werden aus dem Scheduler-Takt, dem
//! Sende-Task und `send_audio` parallel beschrieben und von
//! `status()`/`health_check()` ohne Lock gelesen.
//!
//! Laufzeitfehler im Sendepfad werden ausschliesslich hier sichtbar
//! (plus `StreamEvent::SocketFehler`); es gibt keinen Timeout pro Paket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// ---------------------------------------------------------------------------
// Pro Call
// ---------------------------------------------------------------------------

/// Zaehler einer einzelnen Session
#[derive(Debug, Default)]
pub struct CallStats {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    errors: AtomicU64,
    frames_sent: AtomicU64,
    last_audio_size: AtomicU64,
}

/// Lesbarer Schnappschuss von `CallStats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStatsSnapshot {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub errors: u64,
    pub frames_sent: u64,
    pub last_audio_size: u64,
}

impl CallStats {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Ein Frame wurde an den Transport uebergeben
    pub fn frame_uebergeben(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Ein Datagramm wurde erfolgreich versendet
    pub fn paket_gesendet(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn fehler(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Groesse des zuletzt per `send_audio` gelieferten Chunks
    pub fn audio_empfangen(&self, bytes: usize) {
        self.last_audio_size.store(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CallStatsSnapshot {
        CallStatsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            last_audio_size: self.last_audio_size.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Global
// ---------------------------------------------------------------------------

/// Prozessweite Zaehler der Engine
///
/// Wird bei Konstruktion der Registry angelegt und nur durch einen
/// Prozess-Neustart zurueckgesetzt.
#[derive(Debug)]
pub struct StatsCollector {
    total_calls: AtomicU64,
    active_calls: AtomicU64,
    total_packets_sent: AtomicU64,
    total_bytes_sent: AtomicU64,
    total_errors: AtomicU64,
    start: Instant,
    gestartet_um: DateTime<Utc>,
}

/// Lesbarer Schnappschuss von `StatsCollector`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatsSnapshot {
    pub total_calls: u64,
    pub active_calls: u64,
    pub total_packets_sent: u64,
    pub total_bytes_sent: u64,
    pub total_errors: u64,
    pub gestartet_um: DateTime<Utc>,
    pub uptime_seconds: u64,
}

/// Antwort von `health_check()` (Readiness/Liveness-Probes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub healthy: bool,
    pub active_calls: u64,
    pub total_calls: u64,
    pub total_packets_sent: u64,
    pub total_errors: u64,
    pub uptime_seconds: u64,
}

impl StatsCollector {
    pub fn neu() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            active_calls: AtomicU64::new(0),
            total_packets_sent: AtomicU64::new(0),
            total_bytes_sent: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            start: Instant::now(),
            gestartet_um: Utc::now(),
        }
    }

    /// Eine Session wurde vollstaendig angelegt
    pub fn call_gestartet(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.active_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Eine Session wurde abgebaut
    pub fn call_beendet(&self) {
        // Nie unter 0, auch wenn Abbau und Zaehlung sich ueberholen
        let _ = self
            .active_calls
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn paket_gesendet(&self, bytes: usize) {
        self.total_packets_sent.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn fehler(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_calls(&self) -> u64 {
        self.active_calls.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> GlobalStatsSnapshot {
        GlobalStatsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            active_calls: self.active_calls(),
            total_packets_sent: self.total_packets_sent.load(Ordering::Relaxed),
            total_bytes_sent: self.total_bytes_sent.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            gestartet_um: self.gestartet_um,
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Health-Check; `abschaltung` ist der Shutdown-Zustand der Registry
    pub fn health_check(&self, abschaltung: bool) -> HealthCheck {
        let s = self.snapshot();
        HealthCheck {
            healthy: !abschaltung,
            active_calls: s.active_calls,
            total_calls: s.total_calls,
            total_packets_sent: s.total_packets_sent,
            total_errors: s.total_errors,
            uptime_seconds: s.uptime_seconds,
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
