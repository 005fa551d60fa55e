//! Frame-Scheduler – periodischer 20ms-Takt pro Call
//!
//! Pro Takt wird hoechstens ein Frame versendet:
//!
//! ```text
//! Abschaltung? / Session nicht aktiv? / Puffer < 160 Bytes?
//!     |  ja -> nichts tun (stiller Unterlauf, keine Zaehler aendern sich)
//!     v
//! 160 Bytes vom Pufferanfang entnehmen
//!     |
//!     v
//! create_rtp_packet()  -- Fehler -> loggen, Takt ueberspringen
//!     |
//!     v
//! TransportSender::senden()  -> Sequenz +1, Zeitstempel +160
//! ```
//!
//! Der Task haengt an einem `CancellationToken`. `stoppen()` bricht ab und
//! wartet auf das Task-Ende; danach laeuft garantiert kein Takt mehr und der
//! Socket darf freigegeben werden. Ein Drop ohne `stoppen()` bricht den Takt
//! ebenfalls ab, wartet aber nicht.

use crate::session::CallSession;
use crate::udp::TransportSender;
use callstream_protocol::{create_rtp_packet, RtpHeader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Ergebnis eines einzelnen Takts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickErgebnis {
    /// Ein Paket wurde an den Transport uebergeben
    Gesendet,
    /// Weniger als ein Frame im Puffer
    Unterlauf,
    /// Engine faehrt herunter oder Session ist nicht aktiv
    Inaktiv,
    /// Paketbau fehlgeschlagen, Frame verworfen
    Verworfen,
}

/// Fuehrt einen einzelnen Scheduler-Takt fuer eine Session aus
pub fn tick(session: &CallSession, sender: &TransportSender, abschaltung: bool) -> TickErgebnis {
    if abschaltung || !session.ist_aktiv() {
        return TickErgebnis::Inaktiv;
    }

    let payload_type = session.format().payload_type();

    session.mit_zustand(|zustand| {
        let frame = match zustand.puffer.frame_entnehmen() {
            Some(frame) => frame,
            None => return TickErgebnis::Unterlauf,
        };

        let header = RtpHeader::new(payload_type, zustand.sequence, zustand.timestamp, session.ssrc);
        let paket = match create_rtp_packet(&header, &frame) {
            Ok(paket) => paket,
            Err(e) => {
                tracing::warn!(
                    call_id = %session.call_id,
                    fehler = %e,
                    "RTP-Paket konnte nicht gebaut werden – Frame verworfen"
                );
                return TickErgebnis::Verworfen;
            }
        };

        sender.senden(paket);
        session.stats.frame_uebergeben();
        zustand.weiterzaehlen();

        tracing::trace!(
            call_id = %session.call_id,
            sequence = header.sequence,
            timestamp = header.timestamp,
            rest = zustand.puffer.len(),
            "Frame uebergeben"
        );

        TickErgebnis::Gesendet
    })
}

/// Handle auf den periodischen Task einer Session
pub struct FrameScheduler {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl FrameScheduler {
    /// Startet den periodischen Takt fuer eine Session
    pub fn starten(
        session: Arc<CallSession>,
        sender: TransportSender,
        abschaltung: Arc<AtomicBool>,
        intervall: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(intervall);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        tick(&session, &sender, abschaltung.load(Ordering::Acquire));
                    }
                }
            }

            tracing::debug!(call_id = %session.call_id, "Frame-Scheduler beendet");
        });

        Self { token, task }
    }

    /// Bricht den Takt ab und wartet, bis der Task beendet ist
    ///
    /// Ein Panic im Task wird geloggt und nicht weitergereicht.
    pub async fn stoppen(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.task).await {
            tracing::error!(fehler = %e, "Frame-Scheduler-Task fehlgeschlagen");
        }
    }
}

impl Drop for FrameScheduler {
    /// Ohne `stoppen()` verworfene Scheduler (z.B. beim Drop der Registry)
    /// beenden ihren Takt trotzdem; der Task gibt dabei seinen
    /// `TransportSender` frei.
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallConfig;
    use crate::session::SessionPhase;
    use crate::stats::StatsCollector;
    use crate::udp::{TransportKontext, UdpTransport};
    use callstream_core::CallId;
    use callstream_protocol::AudioFormat;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio::net::UdpSocket;
    use tokio::sync::broadcast;

    struct Aufbau {
        session: Arc<CallSession>,
        transport: UdpTransport,
        empfaenger: UdpSocket,
    }

    async fn aufbau(format: AudioFormat) -> Aufbau {
        let empfaenger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let ziel: SocketAddr = empfaenger.local_addr().unwrap();
        let session = Arc::new(CallSession::mit_startwerten(
            CallId::from("tick-test"),
            CallConfig::neu("127.0.0.1", ziel.port() as u32, format),
            ziel,
            0x0102_0304,
            100,
            8000,
        ));
        let (events, _) = broadcast::channel(16);
        let transport = UdpTransport::oeffnen(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            ziel,
            16,
            TransportKontext {
                call_id: session.call_id.clone(),
                call_stats: Arc::clone(&session.stats),
                global_stats: Arc::new(StatsCollector::neu()),
                events,
            },
        )
        .await
        .unwrap();
        session.phase_setzen(SessionPhase::Aktiv);
        Aufbau {
            session,
            transport,
            empfaenger,
        }
    }

    async fn empfangen(sock: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 1500];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), sock.recv_from(&mut buf))
            .await
            .expect("Datagramm muss ankommen")
            .unwrap();
        buf[..n].to_vec()
    }

    #[tokio::test]
    async fn unterlauf_aendert_keine_zaehler() {
        let a = aufbau(AudioFormat::Ulaw).await;
        a.session.audio_anhaengen(&[0u8; 159]);

        assert_eq!(tick(&a.session, &a.transport.sender(), false), TickErgebnis::Unterlauf);

        let snap = a.session.snapshot();
        assert_eq!(snap.sequence, 100);
        assert_eq!(snap.timestamp, 8000);
        assert_eq!(snap.gepufferte_bytes, 159);
        assert_eq!(snap.stats.frames_sent, 0);
    }

    #[tokio::test]
    async fn ein_tick_sendet_genau_einen_frame() {
        let a = aufbau(AudioFormat::Ulaw).await;
        a.session.audio_anhaengen(&[0xFFu8; 200]);

        assert_eq!(tick(&a.session, &a.transport.sender(), false), TickErgebnis::Gesendet);

        let paket = empfangen(&a.empfaenger).await;
        assert_eq!(paket.len(), 172);
        let header = RtpHeader::decode(&paket).unwrap();
        assert_eq!(header.sequence, 100);
        assert_eq!(header.timestamp, 8000);
        assert_eq!(header.ssrc, 0x0102_0304);
        assert_eq!(header.payload_type, 0);

        let snap = a.session.snapshot();
        assert_eq!(snap.sequence, 101);
        assert_eq!(snap.timestamp, 8160);
        assert_eq!(snap.gepufferte_bytes, 40);

        // Rest reicht nicht fuer einen weiteren Frame
        assert_eq!(tick(&a.session, &a.transport.sender(), false), TickErgebnis::Unterlauf);
    }

    #[tokio::test]
    async fn aufeinanderfolgende_pakete_zaehlen_weiter() {
        let a = aufbau(AudioFormat::Slin).await;
        a.session.audio_anhaengen(&[0u8; 480]);

        for _ in 0..3 {
            assert_eq!(tick(&a.session, &a.transport.sender(), false), TickErgebnis::Gesendet);
        }

        let mut vorher: Option<RtpHeader> = None;
        for _ in 0..3 {
            let paket = empfangen(&a.empfaenger).await;
            assert_eq!(paket[1], 11);
            let header = RtpHeader::decode(&paket).unwrap();
            if let Some(v) = vorher {
                assert_eq!(header.sequence, v.sequence.wrapping_add(1));
                assert_eq!(header.timestamp, v.timestamp.wrapping_add(160));
                assert_eq!(header.ssrc, v.ssrc);
            }
            vorher = Some(header);
        }
    }

    #[tokio::test]
    async fn abschaltung_und_inaktive_session_senden_nicht() {
        let a = aufbau(AudioFormat::Ulaw).await;
        a.session.audio_anhaengen(&[0u8; 160]);

        assert_eq!(tick(&a.session, &a.transport.sender(), true), TickErgebnis::Inaktiv);

        a.session.phase_setzen(SessionPhase::Schliessend);
        assert_eq!(tick(&a.session, &a.transport.sender(), false), TickErgebnis::Inaktiv);

        assert_eq!(a.session.snapshot().gepufferte_bytes, 160);
    }

    #[tokio::test]
    async fn periodischer_task_leert_puffer_und_stoppt() {
        let a = aufbau(AudioFormat::Ulaw).await;
        let scheduler = FrameScheduler::starten(
            Arc::clone(&a.session),
            a.transport.sender(),
            Arc::new(AtomicBool::new(false)),
            Duration::from_millis(5),
        );

        a.session.audio_anhaengen(&[0u8; 320]);
        empfangen(&a.empfaenger).await;
        empfangen(&a.empfaenger).await;

        scheduler.stoppen().await;
        let seq_nach_stopp = a.session.snapshot().sequence;

        // Nach dem Stopp wird nichts mehr entnommen
        a.session.audio_anhaengen(&[0u8; 160]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let snap = a.session.snapshot();
        assert_eq!(snap.sequence, seq_nach_stopp);
        assert_eq!(snap.gepufferte_bytes, 160);
    }

    #[tokio::test]
    async fn drop_ohne_stoppen_beendet_takt() {
        let a = aufbau(AudioFormat::Ulaw).await;
        let scheduler = FrameScheduler::starten(
            Arc::clone(&a.session),
            a.transport.sender(),
            Arc::new(AtomicBool::new(false)),
            Duration::from_millis(5),
        );
        drop(scheduler);
        tokio::time::sleep(Duration::from_millis(20)).await;

        a.session.audio_anhaengen(&[0u8; 160]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(a.session.snapshot().gepufferte_bytes, 160);
        assert_eq!(a.session.snapshot().stats.frames_sent, 0);
    }
}
