#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use sensors::sensirion::crc::CrcWord;

/// Sums every requested delay instead of sleeping
#[derive(Clone, Default)]
pub struct RecordingDelay {
    total_ns: Rc<Cell<u64>>,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }

    pub fn total_us(&self) -> u64 {
        self.total_ns.get() / 1_000
    }

    pub fn reset(&self) {
        self.total_ns.set(0);
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
    }
}

/// Response bytes as a Sensirion device would send them
pub fn words(words: &[u16]) -> Vec<u8> {
    words
        .iter()
        .flat_map(|word| CrcWord::new(*word).to_wire())
        .collect()
}

/// Packs ascii into 16 big endian words, NUL padded
pub fn ascii_words(text: &str) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    bytes[..text.len()].copy_from_slice(text.as_bytes());
    let packed: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    words(&packed)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {expected}, got {actual}"
    );
}
