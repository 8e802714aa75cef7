//! PMSA003I laser particle counter, I2C variant.

use embedded_hal::i2c::I2c;
use tracing::warn;

use super::frame::{Decoder, Frame, FRAME_LEN};
use crate::measurements::{Kind, Measurement, TagKey};
use crate::{Error, ErrorCounts, Sensor};

pub const DEFAULT_ADDRESS: u8 = 0x12;

pub struct Pmsa003i<I> {
    bus: Option<(I, u8)>,
    decoder: Decoder,
    errors: ErrorCounts,
}

impl<I> Default for Pmsa003i<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Pmsa003i<I> {
    pub fn new() -> Self {
        Self {
            bus: None,
            decoder: Decoder::default(),
            errors: ErrorCounts::default(),
        }
    }
}

impl<I: I2c> Pmsa003i<I> {
    pub fn read_frame(&mut self) -> Result<Frame, Error> {
        let (bus, address) = self.bus.as_mut().ok_or(Error::NotInitialized)?;
        let mut buf = [0u8; FRAME_LEN];
        bus.read(*address, &mut buf).map_err(Error::bus)?;
        self.decoder.feed(&buf)
    }
}

fn measurements(frame: &Frame, source: &str) -> Vec<Measurement> {
    let concentration = |kind, value: u16, size| {
        Measurement::new(kind, value, source).tagged(TagKey::ParticleConcentration, size)
    };
    let count = |value: u16, size| {
        Measurement::new(Kind::ParticleCount, value, source).tagged(TagKey::ParticleSize, size)
    };
    vec![
        concentration(Kind::PmStandard, frame.pm1_0_standard, "1.0pm"),
        concentration(Kind::PmStandard, frame.pm2_5_standard, "2.5pm"),
        concentration(Kind::PmStandard, frame.pm10_standard, "10pm"),
        concentration(Kind::PmEnvironmental, frame.pm1_0_environmental, "1.0pm"),
        concentration(Kind::PmEnvironmental, frame.pm2_5_environmental, "2.5pm"),
        concentration(Kind::PmEnvironmental, frame.pm10_environmental, "10pm"),
        count(frame.particles_0_3um, "0.3um"),
        count(frame.particles_0_5um, "0.5um"),
        count(frame.particles_1_0um, "1um"),
        count(frame.particles_2_5um, "2.5um"),
        count(frame.particles_5_0um, "5.0um"),
        count(frame.particles_10um, "10um"),
    ]
}

impl<I: I2c> Sensor<I> for Pmsa003i<I> {
    fn name(&self) -> &'static str {
        "pmsa003i"
    }

    fn matches_family(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(self.name())
    }

    /// The sensor streams frames on its own, there is nothing to set up.
    fn initialize(&mut self, bus: I, address: u8) -> Result<(), Error> {
        if self.bus.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.bus = Some((bus, address));
        Ok(())
    }

    fn collect(&mut self) -> Vec<Measurement> {
        if let Err(err) = self.read_frame() {
            warn!("Discarding pmsa003i frame: {err}");
            self.errors.record(&err);
        }

        self.decoder
            .fields()
            .map(|frame| measurements(frame, self.name()))
            .unwrap_or_default()
    }

    fn error_counts(&self) -> &ErrorCounts {
        &self.errors
    }
}
