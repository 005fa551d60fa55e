//! Call-Session-Registry – einziger Einstiegspunkt der Engine
//!
//! Besitzt alle Ressourcen pro Call (Socket, Takt, Puffer, Zaehler). Andere
//! Komponenten halten nie selbst Sockets oder Tasks, sondern rufen nur die
//! oeffentlichen Operationen auf:
//!
//! - [`initialize_call`](CallSessionRegistry::initialize_call) – Session anlegen (idempotent)
//! - [`send_audio`](CallSessionRegistry::send_audio) – Audio puffern, nie direkt senden
//! - [`cleanup_call`](CallSessionRegistry::cleanup_call) / [`cleanup_all`](CallSessionRegistry::cleanup_all)
//! - [`status`](CallSessionRegistry::status) / [`health_check`](CallSessionRegistry::health_check)
//!
//! Nur Validierungs- und Socket-Fehler aus `initialize_call` erreichen den
//! Aufrufer. Alles andere ist ein geloggter No-op oder landet in Zaehlern
//! und Ereignissen.
//!
//! Thread-safe und `Clone`-faehig (innerer Arc). Jede Instanz ist
//! vollstaendig isoliert; es gibt keinen globalen Zustand.

use crate::config::{CallConfig, EngineConfig};
use crate::scheduler::FrameScheduler;
use crate::session::{CallSession, CallSnapshot, SessionPhase};
use crate::stats::{GlobalStatsSnapshot, HealthCheck, StatsCollector};
use crate::udp::{ziel_aufloesen, TransportKontext, UdpTransport};
use base64::Engine as _;
use callstream_core::{CallId, Result, StreamEvent};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Eintraege
// ---------------------------------------------------------------------------

/// Alle Ressourcen einer aktiven Session; entstehen und vergehen gemeinsam
struct SessionRessourcen {
    session: Arc<CallSession>,
    scheduler: FrameScheduler,
    transport: UdpTransport,
}

/// Slot in der Registry
enum SessionSlot {
    /// `initialize_call` laeuft gerade (Socket wird gebunden)
    Aufbau,
    Aktiv(SessionRessourcen),
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Antwort von `status()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub global: GlobalStatsSnapshot,
    pub active_calls_count: usize,
    pub is_shutting_down: bool,
    pub calls: Vec<CallSnapshot>,
}

// ---------------------------------------------------------------------------
// CallSessionRegistry
// ---------------------------------------------------------------------------

/// Zentrale Registry aller Call-Sessions
#[derive(Clone)]
pub struct CallSessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: EngineConfig,
    sessions: DashMap<CallId, SessionSlot>,
    stats: Arc<StatsCollector>,
    abschaltung: Arc<AtomicBool>,
    events: broadcast::Sender<StreamEvent>,
}

impl CallSessionRegistry {
    /// Erstellt eine neue, leere Registry
    pub fn neu(config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_kanal_groesse.max(1));
        Self {
            inner: Arc::new(RegistryInner {
                config,
                sessions: DashMap::new(),
                stats: Arc::new(StatsCollector::neu()),
                abschaltung: Arc::new(AtomicBool::new(false)),
                events,
            }),
        }
    }

    /// Abonniert alle zukuenftigen Engine-Ereignisse (u.a. `socket_error`)
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Legt eine Session an: Validierung, SSRC, Socket, Takt
    ///
    /// Ist fuer `call_id` bereits eine Session vorhanden (oder im Aufbau),
    /// wird nichts veraendert und `Ok` zurueckgegeben. Validierungsfehler
    /// entstehen, bevor irgendeine Ressource angelegt wird.
    pub async fn initialize_call(&self, call_id: impl Into<CallId>, config: CallConfig) -> Result<()> {
        let call_id = call_id.into();
        let port = config.validieren(&call_id)?;

        match self.inner.sessions.entry(call_id.clone()) {
            Entry::Occupied(_) => {
                tracing::info!(call_id = %call_id, "Call bereits initialisiert – ignoriert");
                return Ok(());
            }
            Entry::Vacant(slot) => {
                slot.insert(SessionSlot::Aufbau);
            }
        }

        match self.ressourcen_anlegen(&call_id, config, port).await {
            Ok(ressourcen) => {
                self.aktivieren(call_id, ressourcen).await;
                Ok(())
            }
            Err(e) => {
                self.inner
                    .sessions
                    .remove_if(&call_id, |_, slot| matches!(slot, SessionSlot::Aufbau));
                tracing::error!(call_id = %call_id, fehler = %e, "Call-Initialisierung fehlgeschlagen");
                Err(e)
            }
        }
    }

    async fn ressourcen_anlegen(
        &self,
        call_id: &CallId,
        config: CallConfig,
        port: u16,
    ) -> Result<SessionRessourcen> {
        let ziel = ziel_aufloesen(&config.remote_host, port).await?;
        let session = Arc::new(CallSession::neu(call_id.clone(), config, ziel));

        let transport = UdpTransport::oeffnen(
            self.inner.config.lokale_adresse,
            ziel,
            self.inner.config.send_queue_groesse,
            TransportKontext {
                call_id: call_id.clone(),
                call_stats: Arc::clone(&session.stats),
                global_stats: Arc::clone(&self.inner.stats),
                events: self.inner.events.clone(),
            },
        )
        .await?;

        let scheduler = FrameScheduler::starten(
            Arc::clone(&session),
            transport.sender(),
            Arc::clone(&self.inner.abschaltung),
            self.inner.config.frame_intervall,
        );

        Ok(SessionRessourcen {
            session,
            scheduler,
            transport,
        })
    }

    /// Ersetzt den Aufbau-Slot durch die fertige Session
    ///
    /// Wurde der Slot waehrend des Aufbaus entfernt (cleanup_call), werden
    /// die frisch angelegten Ressourcen sofort wieder abgebaut.
    async fn aktivieren(&self, call_id: CallId, ressourcen: SessionRessourcen) {
        let verwaist = match self.inner.sessions.get_mut(&call_id) {
            Some(mut slot) if matches!(*slot, SessionSlot::Aufbau) => {
                ressourcen.session.phase_setzen(SessionPhase::Aktiv);
                tracing::info!(
                    call_id = %call_id,
                    ziel = %ressourcen.session.ziel,
                    lokal = %ressourcen.transport.lokale_adresse(),
                    format = %ressourcen.session.format(),
                    ssrc = ressourcen.session.ssrc,
                    "Call initialisiert"
                );
                *slot = SessionSlot::Aktiv(ressourcen);
                None
            }
            _ => Some(ressourcen),
        };

        match verwaist {
            None => {
                self.inner.stats.call_gestartet();
                let _ = self.inner.events.send(StreamEvent::CallGestartet { call_id });
            }
            Some(ressourcen) => {
                tracing::info!(call_id = %call_id, "Call waehrend der Initialisierung beendet");
                Self::ressourcen_abbauen(ressourcen).await;
            }
        }
    }

    /// Baut eine Session ab: Takt stoppen, dann Socket freigeben
    ///
    /// Unbekannte oder bereits abgebaute Calls sind ein No-op.
    pub async fn cleanup_call(&self, call_id: &str) {
        let slot = match self.inner.sessions.remove(call_id) {
            Some((_, slot)) => slot,
            None => {
                tracing::debug!(call_id = %call_id, "Cleanup fuer unbekannten Call – ignoriert");
                return;
            }
        };

        let ressourcen = match slot {
            SessionSlot::Aktiv(ressourcen) => ressourcen,
            SessionSlot::Aufbau => {
                tracing::debug!(call_id = %call_id, "Cleanup waehrend Aufbau – Initialisierung verwirft Ressourcen");
                return;
            }
        };

        let id = ressourcen.session.call_id.clone();
        Self::ressourcen_abbauen(ressourcen).await;
        self.inner.stats.call_beendet();
        tracing::info!(call_id = %id, "Call beendet");
        let _ = self.inner.events.send(StreamEvent::CallBeendet { call_id: id });
    }

    async fn ressourcen_abbauen(ressourcen: SessionRessourcen) {
        let SessionRessourcen {
            session,
            scheduler,
            transport,
        } = ressourcen;

        session.phase_setzen(SessionPhase::Schliessend);
        // Takt zuerst: nach stoppen() greift kein Tick mehr auf den Transport zu
        scheduler.stoppen().await;
        transport.schliessen();
        session.mit_zustand(|z| z.puffer.leeren());
        session.phase_setzen(SessionPhase::Geschlossen);
    }

    /// Baut alle Sessions ab und gibt die Anzahl abgebauter Calls zurueck
    pub async fn cleanup_all(&self) -> usize {
        let ids: Vec<CallId> = self.inner.sessions.iter().map(|e| e.key().clone()).collect();
        let anzahl = ids.len();
        for id in ids {
            self.cleanup_call(id.as_str()).await;
        }
        tracing::info!(anzahl, "Alle Calls beendet");
        anzahl
    }

    /// Setzt das Abschalt-Flag und baut anschliessend alle Sessions ab
    pub async fn shutdown(&self) -> usize {
        self.set_shutting_down(true);
        self.cleanup_all().await
    }

    /// Setzt nur das Abschalt-Flag
    ///
    /// Wirkt kooperativ: der naechste Takt jeder Session und jedes weitere
    /// `send_audio` werden zum No-op. Laufende Sendungen werden nicht
    /// abgebrochen.
    pub fn set_shutting_down(&self, abschaltung: bool) {
        self.inner.abschaltung.store(abschaltung, Ordering::Release);
        tracing::info!(abschaltung, "Abschalt-Flag gesetzt");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.abschaltung.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Audio
    // -----------------------------------------------------------------------

    /// Puffert einen Audio-Chunk fuer den naechsten Takt
    ///
    /// No-op (geloggt) bei Abschaltung, unbekanntem Call oder leerem Chunk.
    /// Sendet nie selbst.
    pub fn send_audio(&self, call_id: &str, chunk: &[u8]) {
        if self.is_shutting_down() {
            tracing::debug!(call_id = %call_id, "Audio verworfen – Engine faehrt herunter");
            return;
        }
        if chunk.is_empty() {
            tracing::debug!(call_id = %call_id, "Leerer Audio-Chunk ignoriert");
            return;
        }

        let session = match self.aktive_session(call_id) {
            Some(session) => session,
            None => {
                tracing::debug!(call_id = %call_id, "Audio fuer unbekannten Call ignoriert");
                return;
            }
        };

        let neu = session.audio_anhaengen(chunk);
        tracing::trace!(
            call_id = %call_id,
            bytes = chunk.len(),
            neu,
            "Audio gepuffert"
        );
    }

    /// Wie `send_audio`, aber mit base64-kodierten Nutzdaten
    ///
    /// Ungueltiges base64 wird geloggt und als Fehler der Session gezaehlt.
    pub fn send_audio_base64(&self, call_id: &str, kodiert: &str) {
        match base64::engine::general_purpose::STANDARD.decode(kodiert.trim()) {
            Ok(bytes) => self.send_audio(call_id, &bytes),
            Err(e) => {
                tracing::warn!(call_id = %call_id, fehler = %e, "Ungueltiges base64-Audio verworfen");
                if let Some(session) = self.aktive_session(call_id) {
                    session.stats.fehler();
                    self.inner.stats.fehler();
                }
            }
        }
    }

    fn aktive_session(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.inner.sessions.get(call_id).and_then(|slot| match &*slot {
            SessionSlot::Aktiv(r) => Some(Arc::clone(&r.session)),
            SessionSlot::Aufbau => None,
        })
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Schnappschuss aller globalen Zaehler und aktiven Sessions
    pub fn status(&self) -> EngineStatus {
        let mut calls: Vec<CallSnapshot> = self
            .inner
            .sessions
            .iter()
            .filter_map(|e| match e.value() {
                SessionSlot::Aktiv(r) => Some(r.session.snapshot()),
                SessionSlot::Aufbau => None,
            })
            .collect();
        calls.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        EngineStatus {
            global: self.inner.stats.snapshot(),
            active_calls_count: calls.len(),
            is_shutting_down: self.is_shutting_down(),
            calls,
        }
    }

    /// Health-Check fuer Readiness/Liveness-Probes
    pub fn health_check(&self) -> HealthCheck {
        self.inner.stats.health_check(self.is_shutting_down())
    }

    /// Schnappschuss einer einzelnen Session
    pub fn call_status(&self, call_id: &str) -> Option<CallSnapshot> {
        self.aktive_session(call_id).map(|s| s.snapshot())
    }

    /// Prueft ob fuer `call_id` eine aktive Session existiert
    pub fn ist_aktiv(&self, call_id: &str) -> bool {
        self.aktive_session(call_id).is_some()
    }

    /// Anzahl aktiver Sessions
    pub fn call_anzahl(&self) -> usize {
        self.inner
            .sessions
            .iter()
            .filter(|e| matches!(e.value(), SessionSlot::Aktiv(_)))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
