//! UDP-Transport – ein Socket und ein Sende-Task pro Call
//!
//! ## Architektur
//!
//! ```text
//! FrameScheduler (20ms)
//!     |
//!     v
//! TransportSender::senden()   <- nicht-blockierend (try_send)
//!     |
//!     v
//! Sende-Queue (mpsc) --> Sende-Task --> UdpSocket::send_to(ziel)
//!                             |
//!                             +--> Erfolg: packets_sent / bytes_sent
//!                             +--> Fehler: errors + StreamEvent::SocketFehler
//! ```
//!
//! Der Sende-Task endet, sobald alle `TransportSender` gedroppt sind. Bereits
//! eingereihte Datagramme werden vorher noch verschickt; danach wird der
//! Socket geschlossen und `StreamEvent::SocketGeschlossen` gemeldet.

use crate::stats::{CallStats, StatsCollector};
use bytes::Bytes;
use callstream_core::{CallId, CallstreamError, Result, StreamEvent};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};

// ---------------------------------------------------------------------------
// Zieladresse
// ---------------------------------------------------------------------------

/// Loest `host:port` in eine Socket-Adresse auf
///
/// IP-Literale werden direkt uebernommen, Hostnamen einmalig per DNS
/// aufgeloest (erste Adresse gewinnt).
pub async fn ziel_aufloesen(host: &str, port: u16) -> Result<SocketAddr> {
    let host = host.trim();
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let mut adressen = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| CallstreamError::Aufloesung {
            host: host.to_string(),
            grund: e.to_string(),
        })?;

    adressen.next().ok_or_else(|| CallstreamError::Aufloesung {
        host: host.to_string(),
        grund: "keine Adresse gefunden".into(),
    })
}

/// Waehlt die lokale Bind-Adresse passend zur Adressfamilie des Ziels
fn bind_adresse(lokal: IpAddr, ziel: &SocketAddr) -> SocketAddr {
    let ip = match (lokal, ziel) {
        (IpAddr::V4(v4), SocketAddr::V6(_)) if v4.is_unspecified() => {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        }
        (lokal, _) => lokal,
    };
    SocketAddr::new(ip, 0)
}

// ---------------------------------------------------------------------------
// Kontext fuer Zaehler und Ereignisse
// ---------------------------------------------------------------------------

/// Alles, was der Transport zum Melden von Ergebnissen braucht
#[derive(Clone)]
pub struct TransportKontext {
    pub call_id: CallId,
    pub call_stats: Arc<CallStats>,
    pub global_stats: Arc<StatsCollector>,
    pub events: broadcast::Sender<StreamEvent>,
}

impl TransportKontext {
    fn fehler_zaehlen(&self) {
        self.call_stats.fehler();
        self.global_stats.fehler();
    }

    fn socket_fehler_melden(&self, fehler: String) {
        // Ohne Abonnenten schlaegt send fehl; das ist kein Fehler
        let _ = self.events.send(StreamEvent::SocketFehler {
            call_id: self.call_id.clone(),
            fehler,
        });
    }
}

// ---------------------------------------------------------------------------
// TransportSender
// ---------------------------------------------------------------------------

/// Sende-Seite des Transports; wird vom Scheduler gehalten
#[derive(Clone)]
pub struct TransportSender {
    tx: mpsc::Sender<Bytes>,
    kontext: TransportKontext,
}

impl TransportSender {
    /// Reiht ein Datagramm zum Versand ein, ohne zu warten
    ///
    /// Gibt `true` zurueck, wenn das Paket angenommen wurde. Eine volle Queue
    /// zaehlt als Sendefehler; die Session laeuft weiter.
    pub fn senden(&self, paket: Bytes) -> bool {
        match self.tx.try_send(paket) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.kontext.fehler_zaehlen();
                tracing::warn!(
                    call_id = %self.kontext.call_id,
                    "Sende-Queue voll – Paket verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.kontext.fehler_zaehlen();
                tracing::debug!(
                    call_id = %self.kontext.call_id,
                    "Sende-Queue geschlossen"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// UdpTransport
// ---------------------------------------------------------------------------

/// Besitzt den Socket eines Calls (ueber den Sende-Task)
pub struct UdpTransport {
    sender: TransportSender,
    lokal: SocketAddr,
    ziel: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl UdpTransport {
    /// Bindet einen neuen Socket und startet den Sende-Task
    ///
    /// Fehler beim Binden werden an den Aufrufer durchgereicht.
    pub async fn oeffnen(
        lokale_adresse: IpAddr,
        ziel: SocketAddr,
        queue_groesse: usize,
        kontext: TransportKontext,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(bind_adresse(lokale_adresse, &ziel)).await?;
        let lokal = socket.local_addr()?;

        tracing::debug!(
            call_id = %kontext.call_id,
            lokal = %lokal,
            ziel = %ziel,
            "UDP-Socket gebunden"
        );

        let (tx, rx) = mpsc::channel::<Bytes>(queue_groesse);
        let task = tokio::spawn(sende_loop(socket, ziel, rx, kontext.clone()));

        Ok(Self {
            sender: TransportSender { tx, kontext },
            lokal,
            ziel,
            _task: task,
        })
    }

    /// Gibt einen weiteren Sender fuer diese Session zurueck
    pub fn sender(&self) -> TransportSender {
        self.sender.clone()
    }

    pub fn lokale_adresse(&self) -> SocketAddr {
        self.lokal
    }

    /// Gibt den Transport frei
    ///
    /// Der Socket schliesst, sobald der Sende-Task seine Queue geleert hat
    /// und kein weiterer `TransportSender` mehr existiert.
    pub fn schliessen(self) {
        tracing::debug!(
            call_id = %self.sender.kontext.call_id,
            ziel = %self.ziel,
            "Transport freigegeben"
        );
    }
}

/// Liest aus der Queue und sendet via UDP an `ziel`
async fn sende_loop(
    socket: UdpSocket,
    ziel: SocketAddr,
    mut rx: mpsc::Receiver<Bytes>,
    kontext: TransportKontext,
) {
    while let Some(paket) = rx.recv().await {
        match socket.send_to(&paket, ziel).await {
            Ok(n) => {
                kontext.call_stats.paket_gesendet(n);
                kontext.global_stats.paket_gesendet(n);
                tracing::trace!(
                    call_id = %kontext.call_id,
                    bytes = n,
                    ziel = %ziel,
                    "RTP-Paket gesendet"
                );
            }
            Err(e) => {
                kontext.fehler_zaehlen();
                tracing::warn!(
                    call_id = %kontext.call_id,
                    fehler = %e,
                    ziel = %ziel,
                    "UDP-Sendefehler"
                );
                kontext.socket_fehler_melden(e.to_string());
            }
        }
    }

    drop(socket);
    tracing::debug!(call_id = %kontext.call_id, ziel = %ziel, "Sende-Task beendet, Socket geschlossen");
    let _ = kontext.events.send(StreamEvent::SocketGeschlossen {
        call_id: kontext.call_id.clone(),
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn kontext(events: broadcast::Sender<StreamEvent>) -> TransportKontext {
        TransportKontext {
            call_id: CallId::from("udp-test"),
            call_stats: Arc::new(CallStats::neu()),
            global_stats: Arc::new(StatsCollector::neu()),
            events,
        }
    }

    #[tokio::test]
    async fn ziel_aus_ip_literal() {
        let addr = ziel_aufloesen("127.0.0.1", 5000).await.unwrap();
        assert_eq!(addr, localhost(5000));

        let addr = ziel_aufloesen("::1", 5000).await.unwrap();
        assert!(addr.is_ipv6());
    }

    #[tokio::test]
    async fn ziel_aus_hostname() {
        let addr = ziel_aufloesen("localhost", 4000).await.unwrap();
        assert_eq!(addr.port(), 4000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn bind_adresse_folgt_adressfamilie() {
        let v6_ziel: SocketAddr = "[::1]:5000".parse().unwrap();
        let unspez = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        assert!(bind_adresse(unspez, &v6_ziel).is_ipv6());
        assert!(bind_adresse(unspez, &localhost(5000)).is_ipv4());
        assert_eq!(bind_adresse(unspez, &localhost(5000)).port(), 0);
    }

    #[tokio::test]
    async fn datagramm_kommt_an_und_wird_gezaehlt() {
        let empfaenger = UdpSocket::bind(localhost(0)).await.unwrap();
        let ziel = empfaenger.local_addr().unwrap();

        let (events, _rx) = broadcast::channel(16);
        let ktx = kontext(events);
        let transport = UdpTransport::oeffnen(IpAddr::V4(Ipv4Addr::LOCALHOST), ziel, 8, ktx.clone())
            .await
            .expect("Transport muss binden koennen");
        assert_ne!(transport.lokale_adresse().port(), 0);

        assert!(transport.sender().senden(Bytes::from_static(&[0x80, 0x00, 1, 2])));

        let mut buf = [0u8; 64];
        let (n, absender) = tokio::time::timeout(Duration::from_secs(2), empfaenger.recv_from(&mut buf))
            .await
            .expect("Datagramm muss ankommen")
            .unwrap();
        assert_eq!(&buf[..n], &[0x80, 0x00, 1, 2]);
        assert_eq!(absender.port(), transport.lokale_adresse().port());

        // Zaehler werden im Sende-Task nach dem send_to aktualisiert
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ktx.call_stats.snapshot().packets_sent, 1);
        assert_eq!(ktx.call_stats.snapshot().bytes_sent, 4);
        assert_eq!(ktx.global_stats.snapshot().total_packets_sent, 1);
    }

    #[tokio::test]
    async fn schliessen_meldet_socket_geschlossen() {
        let empfaenger = UdpSocket::bind(localhost(0)).await.unwrap();
        let (events, mut rx) = broadcast::channel(16);
        let transport = UdpTransport::oeffnen(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            empfaenger.local_addr().unwrap(),
            8,
            kontext(events),
        )
        .await
        .unwrap();

        transport.schliessen();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Ereignis muss ankommen")
            .unwrap();
        assert_eq!(
            event,
            StreamEvent::SocketGeschlossen {
                call_id: CallId::from("udp-test")
            }
        );
    }

    #[tokio::test]
    async fn volle_queue_zaehlt_als_fehler() {
        let (events, _rx) = broadcast::channel(16);
        let ktx = kontext(events);
        // Queue ohne Sende-Task: der Empfaenger wird nie gelesen
        let (tx, _queue_rx) = mpsc::channel::<Bytes>(1);
        let sender = TransportSender {
            tx,
            kontext: ktx.clone(),
        };

        assert!(sender.senden(Bytes::from_static(&[1])));
        assert!(!sender.senden(Bytes::from_static(&[2])));
        assert_eq!(ktx.call_stats.snapshot().errors, 1);
        assert_eq!(ktx.global_stats.snapshot().total_errors, 1);
    }
}
