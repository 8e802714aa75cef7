//! Drivers for the environmental sensors hanging off one I2C bus.
//!
//! Every driver implements [`Sensor`]. The polling loop only ever calls
//! [`Sensor::initialize`] once and then [`Sensor::collect`] every tick, it
//! knows nothing about the protocols spoken underneath:
//!
//! - [`sensirion`]: checksum framed 16 bit commands (SCD4x, SEN5x)
//! - [`plantower`]: fixed 32 byte checksummed frames (PMSA003I)
//! - [`bosch`]: raw registers plus a fixed-point calibration engine (BME68x)

pub mod bosch;
pub mod bus;
pub mod errors;
pub mod measurements;
pub mod plantower;
pub mod sensirion;

pub use bosch::Bme68x;
pub use bus::{BusHandle, SharedBus};
pub use errors::{Error, ErrorCounts, ProtocolError, RangeError};
pub use measurements::{Kind, Measurement, Tag, TagKey, Unit};
pub use plantower::Pmsa003i;
pub use sensirion::{Scd4x, Sen5x};

/// What the polling loop needs from a driver. `I` is the bus handle type,
/// usually a [`BusHandle`] around the platform's I2C device.
pub trait Sensor<I> {
    /// Short lowercase name, also the default source id of records
    fn name(&self) -> &'static str;
    /// Whether a user supplied token (for example `scd41`) names this family
    fn matches_family(&self, token: &str) -> bool;
    /// Claims the bus handle and prepares the device. Only the first call
    /// can succeed, later calls return [`Error::AlreadyInitialized`].
    fn initialize(&mut self, bus: I, address: u8) -> Result<(), Error>;
    /// Takes one sample. Failures are logged and counted, they never reach
    /// the caller. Instead the last good set of records is returned again.
    fn collect(&mut self) -> Vec<Measurement>;
    fn error_counts(&self) -> &ErrorCounts;
}

impl<I, S: Sensor<I> + ?Sized> Sensor<I> for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn matches_family(&self, token: &str) -> bool {
        (**self).matches_family(token)
    }

    fn initialize(&mut self, bus: I, address: u8) -> Result<(), Error> {
        (**self).initialize(bus, address)
    }

    fn collect(&mut self) -> Vec<Measurement> {
        (**self).collect()
    }

    fn error_counts(&self) -> &ErrorCounts {
        (**self).error_counts()
    }
}
