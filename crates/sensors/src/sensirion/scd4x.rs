//! SCD40/SCD41 photoacoustic CO2 sensor.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::{debug, info, warn};

use super::command::{Command, Device};
use crate::measurements::{Kind, Measurement};
use crate::{Error, ErrorCounts, ProtocolError, RangeError, Sensor};

pub const DEFAULT_ADDRESS: u8 = 0x62;

pub mod commands {
    use super::Command;

    pub const REINIT: Command = Command::new(0x3646, "reinit", 30, 0);
    pub const FACTORY_RESET: Command = Command::new(0x3632, "factory reset", 1200, 0);
    pub const FORCED_RECALIBRATION: Command =
        Command::new(0x362f, "perform forced recalibration", 400, 1);
    pub const SELF_TEST: Command = Command::new(0x3639, "perform self test", 10_000, 1);
    pub const DATA_READY: Command = Command::new(0xe4b8, "get data ready status", 1, 1);
    pub const STOP_PERIODIC: Command =
        Command::new(0x3f86, "stop periodic measurement", 500, 0);
    pub const START_PERIODIC: Command =
        Command::new(0x21b1, "start periodic measurement", 0, 0);
    pub const START_LOW_POWER_PERIODIC: Command =
        Command::new(0x21ac, "start low power periodic measurement", 0, 0);
    pub const READ_MEASUREMENT: Command = Command::new(0xec05, "read measurement", 1, 3);
    pub const SERIAL_NUMBER: Command = Command::new(0x3682, "get serial number", 1, 3);
    pub const GET_TEMPERATURE_OFFSET: Command =
        Command::new(0x2318, "get temperature offset", 1, 1);
    pub const SET_TEMPERATURE_OFFSET: Command =
        Command::new(0x241d, "set temperature offset", 1, 0);
    pub const GET_ALTITUDE: Command = Command::new(0x2322, "get sensor altitude", 1, 1);
    pub const SET_ALTITUDE: Command = Command::new(0x2427, "set sensor altitude", 1, 0);
    pub const SET_AMBIENT_PRESSURE: Command =
        Command::new(0xe000, "set ambient pressure", 1, 0);
    pub const PERSIST_SETTINGS: Command = Command::new(0x3615, "persist settings", 800, 0);
    pub const GET_AUTOMATIC_SELF_CALIBRATION: Command =
        Command::new(0x2313, "get automatic self calibration enabled", 1, 1);
    pub const SET_AUTOMATIC_SELF_CALIBRATION: Command =
        Command::new(0x2416, "set automatic self calibration enabled", 1, 0);
    pub const WAKE_UP: Command = Command::new(0x36f6, "wake up", 30, 0);
}

const MAX_TEMPERATURE_OFFSET: f32 = 374.0;
const FORCED_RECALIBRATION_FAILED: u16 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// ppm
    pub co2: u16,
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
}

impl Reading {
    fn from_words(co2: u16, temperature: u16, humidity: u16) -> Self {
        Self {
            co2,
            temperature: -45.0 + 175.0 * f32::from(temperature) / 65536.0,
            humidity: 100.0 * f32::from(humidity) / 65536.0,
        }
    }

    fn measurements(&self, source: &str) -> Vec<Measurement> {
        vec![
            Measurement::new(Kind::Temperature, self.temperature, source),
            Measurement::new(Kind::Humidity, self.humidity, source),
            Measurement::new(Kind::Co2, self.co2, source),
        ]
    }
}

pub struct Scd4x<I, D> {
    claimed: bool,
    /// only set once bring up succeeded
    device: Option<Device<I>>,
    delay: D,
    serial_number: Option<String>,
    last: Option<Reading>,
    errors: ErrorCounts,
}

impl<I: I2c, D: DelayNs> Scd4x<I, D> {
    pub fn new(delay: D) -> Self {
        Self {
            claimed: false,
            device: None,
            delay,
            serial_number: None,
            last: None,
            errors: ErrorCounts::default(),
        }
    }

    fn execute(&mut self, command: &Command, argument: Option<u16>) -> Result<Vec<u16>, Error> {
        let device = self.device.as_mut().ok_or(Error::NotInitialized)?;
        device.execute(&mut self.delay, command, argument)
    }

    fn query(&mut self, command: &Command, argument: Option<u16>) -> Result<u16, Error> {
        let device = self.device.as_mut().ok_or(Error::NotInitialized)?;
        device.query(&mut self.delay, command, argument)
    }

    fn send(&mut self, command: &Command, argument: Option<u16>) -> Result<(), Error> {
        self.execute(command, argument).map(|_| ())
    }

    #[must_use]
    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn read_serial_number(&mut self) -> Result<String, Error> {
        let words = self.execute(&commands::SERIAL_NUMBER, None)?;
        Ok(words.iter().map(|word| format!("{word:04x}")).collect())
    }

    /// `Ok(None)` when the sensor has not finished a new measurement yet
    pub fn read_measurement(&mut self) -> Result<Option<Reading>, Error> {
        let status = self.query(&commands::DATA_READY, None)?;
        if status & 0x07ff == 0 {
            return Ok(None);
        }

        let words = self.execute(&commands::READ_MEASUREMENT, None)?;
        let [co2, temperature, humidity] = words[..] else {
            return Err(ProtocolError::WrongLength {
                expected: 9,
                got: words.len() * 3,
            }
            .into());
        };
        Ok(Some(Reading::from_words(co2, temperature, humidity)))
    }

    pub fn start_periodic_measurement(&mut self) -> Result<(), Error> {
        self.send(&commands::START_PERIODIC, None)
    }

    pub fn start_low_power_periodic_measurement(&mut self) -> Result<(), Error> {
        self.send(&commands::START_LOW_POWER_PERIODIC, None)
    }

    pub fn stop_periodic_measurement(&mut self) -> Result<(), Error> {
        self.send(&commands::STOP_PERIODIC, None)
    }

    /// Restores every setting to the factory default, this includes
    /// persisted ones. Stops periodic measurement first.
    pub fn factory_reset(&mut self) -> Result<(), Error> {
        self.stop_periodic_measurement()?;
        self.send(&commands::FACTORY_RESET, None)
    }

    /// Takes ten seconds. Stops periodic measurement first.
    pub fn self_test(&mut self) -> Result<(), Error> {
        self.stop_periodic_measurement()?;
        match self.query(&commands::SELF_TEST, None)? {
            0 => Ok(()),
            malfunction => Err(ProtocolError::SelfTest(malfunction).into()),
        }
    }

    /// Recalibrates against a known reference concentration. Only works
    /// after at least three minutes of operation. Returns the correction
    /// that was applied in ppm.
    pub fn forced_recalibration(&mut self, target_ppm: u16) -> Result<i32, Error> {
        self.stop_periodic_measurement()?;
        let correction = self.query(&commands::FORCED_RECALIBRATION, Some(target_ppm))?;
        if correction == FORCED_RECALIBRATION_FAILED {
            return Err(ProtocolError::Recalibration.into());
        }
        Ok(i32::from(correction) - 0x8000)
    }

    pub fn automatic_self_calibration(&mut self) -> Result<bool, Error> {
        Ok(self.query(&commands::GET_AUTOMATIC_SELF_CALIBRATION, None)? == 1)
    }

    pub fn set_automatic_self_calibration(&mut self, enabled: bool) -> Result<(), Error> {
        self.send(
            &commands::SET_AUTOMATIC_SELF_CALIBRATION,
            Some(u16::from(enabled)),
        )
    }

    /// Writes the current configuration to EEPROM, without this it is lost
    /// on power cycle.
    pub fn persist_settings(&mut self) -> Result<(), Error> {
        self.send(&commands::PERSIST_SETTINGS, None)
    }

    /// Pressure compensation, overrides the altitude setting.
    pub fn set_ambient_pressure(&mut self, hpa: u16) -> Result<(), Error> {
        self.send(&commands::SET_AMBIENT_PRESSURE, Some(hpa))
    }

    /// Meters above sea level
    pub fn altitude(&mut self) -> Result<u16, Error> {
        self.query(&commands::GET_ALTITUDE, None)
    }

    pub fn set_altitude(&mut self, meters: u16) -> Result<(), Error> {
        self.send(&commands::SET_ALTITUDE, Some(meters))
    }

    /// °C
    pub fn temperature_offset(&mut self) -> Result<f32, Error> {
        let raw = self.query(&commands::GET_TEMPERATURE_OFFSET, None)?;
        Ok(175.0 * f32::from(raw) / 65536.0)
    }

    /// Offset in °C subtracted from the raw temperature, at most 374°C.
    pub fn set_temperature_offset(&mut self, offset: f32) -> Result<(), Error> {
        if offset > MAX_TEMPERATURE_OFFSET {
            return Err(RangeError::TemperatureOffset(offset).into());
        }
        // float to int casts saturate, offsets near the maximum clamp to
        // what the register can hold
        let raw = (offset * 65536.0 / 175.0) as u16;
        self.send(&commands::SET_TEMPERATURE_OFFSET, Some(raw))
    }

    fn bring_up(&mut self) -> Result<(), Error> {
        // the sensor does not acknowledge the wake up command but does
        // wake up, it still needs the time
        if let Err(err) = self.send(&commands::WAKE_UP, None) {
            debug!("scd4x did not acknowledge wake up: {err}");
            self.delay.delay_ms(commands::WAKE_UP.delay_ms());
        }
        self.stop_periodic_measurement()?;
        self.send(&commands::REINIT, None)?;
        let serial_number = self.read_serial_number()?;
        info!("Sensirion SCD4x, serial number: {serial_number}");
        self.serial_number = Some(serial_number);
        self.start_periodic_measurement()
    }
}

impl<I: I2c, D: DelayNs> Sensor<I> for Scd4x<I, D> {
    fn name(&self) -> &'static str {
        "scd4x"
    }

    fn matches_family(&self, token: &str) -> bool {
        token.len() == 5 && token.to_lowercase().starts_with("scd4")
    }

    fn initialize(&mut self, bus: I, address: u8) -> Result<(), Error> {
        if self.claimed {
            return Err(Error::AlreadyInitialized);
        }
        self.claimed = true;

        self.device = Some(Device::new(bus, address));
        if let Err(err) = self.bring_up() {
            self.device = None;
            return Err(err);
        }
        Ok(())
    }

    fn collect(&mut self) -> Vec<Measurement> {
        match self.read_measurement() {
            Ok(Some(reading)) => self.last = Some(reading),
            Ok(None) => debug!("scd4x has no new measurement yet"),
            Err(err) => {
                warn!("Could not read scd4x measurement: {err}");
                self.errors.record(&err);
            }
        }

        self.last
            .map(|reading| reading.measurements(self.name()))
            .unwrap_or_default()
    }

    fn error_counts(&self) -> &ErrorCounts {
        &self.errors
    }
}
