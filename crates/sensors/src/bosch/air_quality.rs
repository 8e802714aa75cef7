//! A rough indoor air quality score from humidity and gas resistance.
//!
//! This is a community heuristic, not the vendor's calibrated IAQ
//! algorithm. Keep the arithmetic stable, do not tune it.

use heapless::Deque;

pub const WINDOW: usize = 50;

const HUMIDITY_BASELINE: f64 = 40.0;
const HUMIDITY_WEIGHT: f64 = 0.25;

/// The last [`WINDOW`] gas resistance samples
#[derive(Debug, Default)]
pub struct GasBaselineWindow {
    samples: Deque<f32, WINDOW>,
}

impl GasBaselineWindow {
    /// Adds a sample, evicting the oldest once full.
    pub fn push(&mut self, resistance: f32) {
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // there is room, made above if needed
        let _ = self.samples.push_back(resistance);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.samples.iter()
    }

    /// Sum of the samples held divided by the full window size. While the
    /// window is still filling this stays below the mean. `None` while empty.
    #[must_use]
    pub fn baseline(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f32 = self.samples.iter().sum();
        Some(sum / WINDOW as f32)
    }
}

/// Score from 0 (bad) to 100 (good). A quarter comes from how far humidity
/// is from 40 %, the rest from how far gas resistance dropped below its
/// baseline.
#[must_use]
pub fn score(humidity: f32, gas_resistance: f32, baseline: f32) -> u16 {
    let humidity_offset = f64::from(humidity) - HUMIDITY_BASELINE;
    let humidity_score = if humidity_offset > 0.0 {
        (100.0 - HUMIDITY_BASELINE - humidity_offset) / (100.0 - HUMIDITY_BASELINE)
            * (HUMIDITY_WEIGHT * 100.0)
    } else {
        (HUMIDITY_BASELINE + humidity_offset) / HUMIDITY_BASELINE * (HUMIDITY_WEIGHT * 100.0)
    };

    let gas_offset = baseline - gas_resistance;
    let gas_score = if gas_offset > 0.0 {
        f64::from(gas_resistance) / f64::from(baseline) * (100.0 - HUMIDITY_WEIGHT * 100.0)
    } else {
        100.0 - HUMIDITY_WEIGHT * 100.0
    };

    (humidity_score + gas_score) as u16
}
