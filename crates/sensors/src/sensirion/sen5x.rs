//! SEN50/SEN54/SEN55 environmental sensor node: particulate matter, VOC,
//! NOx, humidity and temperature.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::{info, warn};

use super::command::{Command, Device};
use crate::measurements::{Kind, Measurement, TagKey};
use crate::{Error, ErrorCounts, ProtocolError, Sensor};

pub const DEFAULT_ADDRESS: u8 = 0x69;

pub mod commands {
    use super::Command;

    pub const RESET: Command = Command::new(0xd304, "device reset", 100, 0);
    pub const SERIAL_NUMBER: Command = Command::new(0xd033, "read serial number", 20, 16);
    pub const PRODUCT_NAME: Command = Command::new(0xd014, "read product name", 20, 16);
    pub const VERSION: Command = Command::new(0xd100, "read firmware version", 20, 4);
    pub const READ_STATUS: Command = Command::new(0xd206, "read device status", 20, 2);
    pub const START_MEASUREMENT: Command = Command::new(0x0021, "start measurement", 50, 0);
    pub const READ_MEASURED_VALUES: Command =
        Command::new(0x03c4, "read measured values", 20, 8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versions {
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub firmware_debug: bool,
    pub hardware_major: u8,
    pub hardware_minor: u8,
    pub protocol_major: u8,
    pub protocol_minor: u8,
}

impl Versions {
    fn from_bytes(b: &[u8; 8]) -> Self {
        Self {
            firmware_major: b[0],
            firmware_minor: b[1],
            firmware_debug: b[2] == 1,
            hardware_major: b[3],
            hardware_minor: b[4],
            protocol_major: b[5],
            protocol_minor: b[6],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub product_name: String,
    pub serial_number: String,
    pub versions: Versions,
    pub status: u32,
}

/// Values as reported, already scaled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// µg/m³
    pub pm1_0: f32,
    pub pm2_5: f32,
    pub pm4_0: f32,
    pub pm10: f32,
    /// %RH
    pub humidity: f32,
    /// °C
    pub temperature: f32,
    pub voc_index: f32,
    pub nox_index: f32,
}

impl Reading {
    fn from_words(w: &[u16; 8]) -> Self {
        let signed = |word: u16| f32::from(word as i16);
        Self {
            pm1_0: f32::from(w[0]) / 10.0,
            pm2_5: f32::from(w[1]) / 10.0,
            pm4_0: f32::from(w[2]) / 10.0,
            pm10: f32::from(w[3]) / 10.0,
            humidity: signed(w[4]) / 100.0,
            temperature: signed(w[5]) / 200.0,
            voc_index: signed(w[6]) / 10.0,
            nox_index: signed(w[7]) / 10.0,
        }
    }

    fn measurements(&self, source: &str) -> Vec<Measurement> {
        let pm = |value: f32, size: &'static str| {
            Measurement::new(Kind::PmEnvironmental, value, source)
                .tagged(TagKey::ParticleConcentration, size)
        };
        vec![
            Measurement::new(Kind::Humidity, self.humidity, source),
            Measurement::new(Kind::Temperature, self.temperature, source),
            Measurement::new(Kind::Nox, self.nox_index, source),
            Measurement::new(Kind::Voc, self.voc_index, source),
            pm(self.pm1_0, "1.0pm"),
            pm(self.pm2_5, "2.5pm"),
            pm(self.pm4_0, "4.0pm"),
            pm(self.pm10, "10pm"),
        ]
    }
}

/// Bytes of the words in order, up to the first NUL
fn ascii(words: &[u16]) -> String {
    let bytes: Vec<u8> = words
        .iter()
        .flat_map(|word| word.to_be_bytes())
        .take_while(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn exactly<const N: usize>(words: Vec<u16>) -> Result<[u16; N], Error> {
    let got = words.len() * 3;
    words.try_into().map_err(|_| {
        ProtocolError::WrongLength {
            expected: N * 3,
            got,
        }
        .into()
    })
}

pub struct Sen5x<I, D> {
    claimed: bool,
    /// only set once bring up succeeded
    device: Option<Device<I>>,
    delay: D,
    info: Option<DeviceInfo>,
    last: Option<Reading>,
    errors: ErrorCounts,
}

impl<I: I2c, D: DelayNs> Sen5x<I, D> {
    pub fn new(delay: D) -> Self {
        Self {
            claimed: false,
            device: None,
            delay,
            info: None,
            last: None,
            errors: ErrorCounts::default(),
        }
    }

    fn execute(&mut self, command: &Command) -> Result<Vec<u16>, Error> {
        let device = self.device.as_mut().ok_or(Error::NotInitialized)?;
        device.execute(&mut self.delay, command, None)
    }

    /// Available once initialized
    #[must_use]
    pub fn info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        self.execute(&commands::RESET).map(|_| ())
    }

    pub fn start_measurement(&mut self) -> Result<(), Error> {
        self.execute(&commands::START_MEASUREMENT).map(|_| ())
    }

    pub fn product_name(&mut self) -> Result<String, Error> {
        self.execute(&commands::PRODUCT_NAME).map(|words| ascii(&words))
    }

    pub fn serial_number(&mut self) -> Result<String, Error> {
        self.execute(&commands::SERIAL_NUMBER).map(|words| ascii(&words))
    }

    pub fn versions(&mut self) -> Result<Versions, Error> {
        let words: [u16; 4] = exactly(self.execute(&commands::VERSION)?)?;
        let mut bytes = [0u8; 8];
        for (chunk, word) in bytes.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        Ok(Versions::from_bytes(&bytes))
    }

    /// Status register, nonzero bits flag fan, laser or gas sensor faults
    pub fn status(&mut self) -> Result<u32, Error> {
        let [high, low] = exactly::<2>(self.execute(&commands::READ_STATUS)?)?;
        Ok((u32::from(high) << 16) | u32::from(low))
    }

    pub fn read_measured_values(&mut self) -> Result<Reading, Error> {
        let words = exactly(self.execute(&commands::READ_MEASURED_VALUES)?)?;
        Ok(Reading::from_words(&words))
    }

    fn source(&self) -> &str {
        self.info
            .as_ref()
            .map(|info| info.product_name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("sen5x")
    }

    fn bring_up(&mut self) -> Result<(), Error> {
        self.reset()?;
        let versions = self.versions()?;
        let product_name = self.product_name()?;
        let serial_number = self.serial_number()?;
        let status = self.status()?;
        info!(
            "Sensirion {product_name}, serial number: {serial_number}, status: {status:#010x}, \
            firmware: {}.{}{}, hardware: {}.{}, protocol: {}.{}",
            versions.firmware_major,
            versions.firmware_minor,
            if versions.firmware_debug { " (debug)" } else { "" },
            versions.hardware_major,
            versions.hardware_minor,
            versions.protocol_major,
            versions.protocol_minor,
        );
        self.info = Some(DeviceInfo {
            product_name,
            serial_number,
            versions,
            status,
        });
        self.start_measurement()
    }
}

impl<I: I2c, D: DelayNs> Sensor<I> for Sen5x<I, D> {
    fn name(&self) -> &'static str {
        "sen5x"
    }

    fn matches_family(&self, token: &str) -> bool {
        token.len() == 5 && token.to_lowercase().starts_with("sen5")
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
        match self.read_measured_values() {
            Ok(reading) => self.last = Some(reading),
            Err(err) => {
                warn!("Could not read sen5x measurement: {err}");
                self.errors.record(&err);
            }
        }

        let source = self.source();
        self.last
            .map(|reading| reading.measurements(source))
            .unwrap_or_default()
    }

    fn error_counts(&self) -> &ErrorCounts {
        &self.errors
    }
}
