//! Audio-Frame-Puffer pro Call
//!
//! Sammelt eingehende Audio-Bytes in Wire-Reihenfolge und gibt sie in
//! exakten Frames von `AudioFormat::frame_bytes()` Bytes wieder ab.
//!
//! Fuer slin liefert die Synthese-Pipeline 16-Bit-Samples little-endian;
//! RTP transportiert sie big-endian. Beim Anhaengen wird daher jedes Sample
//! getauscht. Ein ungerades Restbyte wird zurueckgehalten und mit dem
//! naechsten Chunk zusammengefuehrt, damit die Sample-Grenzen erhalten bleiben.

use bytes::{Bytes, BytesMut};
use callstream_protocol::AudioFormat;

/// Byte-Akkumulator einer Session
#[derive(Debug)]
pub struct AudioFrameBuffer {
    format: AudioFormat,
    daten: BytesMut,
    /// Erstes Byte eines noch unvollstaendigen slin-Samples
    halbes_sample: Option<u8>,
}

impl AudioFrameBuffer {
    /// Erstellt einen leeren Puffer fuer das gegebene Format
    pub fn neu(format: AudioFormat) -> Self {
        Self {
            format,
            daten: BytesMut::with_capacity(format.frame_bytes() * 8),
            halbes_sample: None,
        }
    }

    /// Haengt einen Chunk an und gibt die Anzahl neu gepufferter Bytes zurueck
    pub fn anhaengen(&mut self, chunk: &[u8]) -> usize {
        match self.format {
            AudioFormat::Ulaw => {
                self.daten.extend_from_slice(chunk);
                chunk.len()
            }
            AudioFormat::Slin => self.slin_anhaengen(chunk),
        }
    }

    fn slin_anhaengen(&mut self, chunk: &[u8]) -> usize {
        let mut rest = chunk;
        let vorher = self.daten.len();
        self.daten.reserve(chunk.len() + 1);

        if let Some(lo) = self.halbes_sample.take() {
            match rest.split_first() {
                Some((&hi, tail)) => {
                    self.daten.extend_from_slice(&[hi, lo]);
                    rest = tail;
                }
                None => {
                    self.halbes_sample = Some(lo);
                    return 0;
                }
            }
        }

        let mut paare = rest.chunks_exact(2);
        for sample in &mut paare {
            self.daten.extend_from_slice(&[sample[1], sample[0]]);
        }
        if let [einzeln] = paare.remainder() {
            self.halbes_sample = Some(*einzeln);
        }

        self.daten.len() - vorher
    }

    /// True wenn mindestens ein voller Frame gepuffert ist
    pub fn hat_frame(&self) -> bool {
        self.daten.len() >= self.format.frame_bytes()
    }

    /// Entnimmt genau einen Frame vom Anfang des Puffers
    ///
    /// Gibt `None` zurueck, wenn weniger als ein Frame gepuffert ist; der
    /// Puffer bleibt dann unveraendert.
    pub fn frame_entnehmen(&mut self) -> Option<Bytes> {
        if !self.hat_frame() {
            return None;
        }
        Some(self.daten.split_to(self.format.frame_bytes()).freeze())
    }

    /// Anzahl gepufferter, noch nicht gesendeter Bytes
    pub fn len(&self) -> usize {
        self.daten.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daten.is_empty()
    }

    /// Verwirft alle gepufferten Daten
    pub fn leeren(&mut self) {
        self.daten.clear();
        self.halbes_sample = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use callstream_protocol::SAMPLES_PER_FRAME;

    #[test]
    fn unterlauf_liefert_keinen_frame() {
        let mut puffer = AudioFrameBuffer::neu(AudioFormat::Ulaw);
        puffer.anhaengen(&[0u8; SAMPLES_PER_FRAME - 1]);
        assert!(!puffer.hat_frame());
        assert!(puffer.frame_entnehmen().is_none());
        assert_eq!(puffer.len(), SAMPLES_PER_FRAME - 1);
    }

    #[test]
    fn frame_entnehmen_laesst_rest_intakt() {
        let mut puffer = AudioFrameBuffer::neu(AudioFormat::Ulaw);
        let daten: Vec<u8> = (0..200u16).map(|i| i as u8).collect();
        puffer.anhaengen(&daten);

        let frame = puffer.frame_entnehmen().unwrap();
        assert_eq!(frame.len(), SAMPLES_PER_FRAME);
        assert_eq!(&frame[..], &daten[..SAMPLES_PER_FRAME]);
        assert_eq!(puffer.len(), 40);

        // Rest kommt beim naechsten Frame zuerst
        puffer.anhaengen(&[0xEE; 120]);
        let frame = puffer.frame_entnehmen().unwrap();
        assert_eq!(&frame[..40], &daten[SAMPLES_PER_FRAME..]);
        assert_eq!(frame[40], 0xEE);
        assert!(puffer.is_empty());
    }

    #[test]
    fn ulaw_bytes_unveraendert() {
        let mut puffer = AudioFrameBuffer::neu(AudioFormat::Ulaw);
        assert_eq!(puffer.anhaengen(&[1, 2, 3]), 3);
        assert_eq!(puffer.len(), 3);
    }

    #[test]
    fn slin_tauscht_byte_reihenfolge() {
        let mut puffer = AudioFrameBuffer::neu(AudioFormat::Slin);
        // 0x1234 und 0xABCD little-endian
        puffer.anhaengen(&[0x34, 0x12, 0xCD, 0xAB]);
        puffer.anhaengen(&[0u8; SAMPLES_PER_FRAME - 4]);
        let frame = puffer.frame_entnehmen().unwrap();
        assert_eq!(&frame[..4], &[0x12, 0x34, 0xAB, 0xCD]);
    }

    #[test]
    fn slin_ungerades_restbyte_wird_zusammengefuehrt() {
        let mut puffer = AudioFrameBuffer::neu(AudioFormat::Slin);
        assert_eq!(puffer.anhaengen(&[0x34, 0x12, 0x78]), 2);
        assert_eq!(puffer.len(), 2);

        // Leerer Chunk aendert nichts am Restbyte
        assert_eq!(puffer.anhaengen(&[]), 0);

        assert_eq!(puffer.anhaengen(&[0x56]), 2);
        puffer.anhaengen(&[0u8; SAMPLES_PER_FRAME - 4]);
        let frame = puffer.frame_entnehmen().unwrap();
        assert_eq!(&frame[..4], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn leeren_verwirft_alles() {
        let mut puffer = AudioFrameBuffer::neu(AudioFormat::Slin);
        puffer.anhaengen(&[1, 2, 3]);
        puffer.leeren();
        assert!(puffer.is_empty());
        // Restbyte ist ebenfalls weg
        assert_eq!(puffer.anhaengen(&[4, 5]), 2);
        puffer.anhaengen(&[0u8; SAMPLES_PER_FRAME - 2]);
        assert_eq!(&puffer.frame_entnehmen().unwrap()[..2], &[5, 4]);
    }
}
