//! callstream-voice – RTP-Sende-Engine fuer Telefonie-Calls
//!
//! Streamt Call-Audio im festen 20ms-Takt per RTP/UDP an Telefonie-Endpunkte.
//!
//! ## Module
//! - [`registry`] – Einziger Einstiegspunkt: Sessions anlegen, fuettern, abbauen
//! - [`scheduler`] – Periodischer Frame-Takt pro Call
//! - [`buffer`] – Byte-Akkumulator pro Call
//! - [`udp`] – UDP-Socket und Sende-Task pro Call
//! - [`session`] – Zustand einer einzelnen Call-Session
//! - [`stats`] – Zaehler pro Call und global, Health-Check
//! - [`config`] – Engine-Konfiguration

pub mod buffer;
pub mod config;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod udp;

pub use config::{CallConfig, EngineConfig};
pub use registry::{CallSessionRegistry, EngineStatus};
pub use stats::{HealthCheck, StatsCollector};
