//! callstream-protocol – Wire-Format der Engine
//!
//! Definiert die Audioformate (ulaw/slin) und den RTP-Header, mit dem jeder
//! 20ms-Frame als einzelnes UDP-Datagramm verschickt wird.

pub mod format;
pub mod rtp;

pub use format::{AudioFormat, FRAME_SIZE_MS, SAMPLES_PER_FRAME, SAMPLE_RATE_HZ};
pub use rtp::{create_rtp_packet, PacketError, RtpHeader};
