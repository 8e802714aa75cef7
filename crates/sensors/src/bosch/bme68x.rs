//! BME680/BME688 gas, pressure, humidity and temperature sensor.
//!
//! Every sample is a one-shot forced measurement:
//!
//! ```text
//! ensure sleep -> configure -> forced -> wait -> poll new data -> read field -> sleep
//! ```
//!
//! The chip falls back to sleep by itself once the field is written.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::{debug, info, trace, warn};

use super::air_quality::{self, GasBaselineWindow};
use super::calibration::{Coefficients, Variant};
use super::heater::{self, heater_duration_code};
use super::registers as reg;
use crate::measurements::{Kind, Measurement};
use crate::{Error, ErrorCounts, ProtocolError, RangeError, Sensor};

pub const DEFAULT_ADDRESS: u8 = 0x76;

const POLL_ATTEMPTS: u8 = 10;
const POLL_INTERVAL_MS: u32 = 10;
const SOFT_RESET_DELAY_MS: u32 = 10;
/// Ambient temperature assumed for the heater before the first reading
const DEFAULT_AMBIENT: i32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversampling {
    Skipped,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    fn code(self) -> u8 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 3,
            Oversampling::X8 => 4,
            Oversampling::X16 => 5,
        }
    }

    fn cycles(self) -> u32 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub humidity_oversampling: Oversampling,
    /// °C the heater plate is driven to, at most 400
    pub heater_temperature: u16,
    /// ms
    pub heater_duration: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature_oversampling: Oversampling::X8,
            pressure_oversampling: Oversampling::X4,
            humidity_oversampling: Oversampling::X2,
            heater_temperature: heater::DEFAULT_TEMPERATURE,
            heater_duration: heater::DEFAULT_DURATION,
        }
    }
}

impl Settings {
    /// Time in µs a forced temperature, pressure and humidity measurement
    /// takes, excluding the heater.
    #[must_use]
    pub fn measurement_duration(&self) -> u32 {
        let cycles = self.temperature_oversampling.cycles()
            + self.pressure_oversampling.cycles()
            + self.humidity_oversampling.cycles();
        let tph_switching = 477 * 4;
        let gas_measurement = 477 * 5;
        let wake_up = 1000;
        cycles * 1963 + tph_switching + gas_measurement + wake_up
    }
}

/// The raw field as read, only valid within one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub adc_temperature: u32,
    pub adc_pressure: u32,
    pub adc_humidity: u16,
    pub adc_gas: u16,
    pub gas_range: u8,
    pub gas_valid: bool,
    pub heat_stable: bool,
}

impl RawSample {
    #[must_use]
    pub fn parse(b: &[u8; reg::FIELD_LEN], variant: Variant) -> Self {
        let adc_20bit = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };
        let (gas_msb, gas_lsb) = match variant {
            Variant::GasLow => (b[13], b[14]),
            Variant::GasHigh => (b[15], b[16]),
        };

        Self {
            adc_pressure: adc_20bit(b[2], b[3], b[4]),
            adc_temperature: adc_20bit(b[5], b[6], b[7]),
            adc_humidity: u16::from_be_bytes([b[8], b[9]]),
            adc_gas: (u16::from(gas_msb) << 2) | u16::from(gas_lsb >> 6),
            gas_range: gas_lsb & reg::GAS_RANGE_MSK,
            gas_valid: gas_lsb & reg::GAS_VALID_MSK != 0,
            heat_stable: gas_lsb & reg::HEAT_STAB_MSK != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// °C
    pub temperature: f32,
    /// hPa
    pub pressure: f32,
    /// %
    pub humidity: f32,
    /// Ω
    pub gas_resistance: f32,
    /// Only present when the heater was stable during this measurement
    pub air_quality: Option<u16>,
}

impl Reading {
    fn measurements(&self, source: &str) -> Vec<Measurement> {
        let mut list = vec![
            Measurement::new(Kind::Temperature, self.temperature, source),
            Measurement::new(Kind::Pressure, self.pressure, source),
            Measurement::new(Kind::Humidity, self.humidity, source),
            Measurement::new(Kind::GasResistance, self.gas_resistance, source),
        ];
        if let Some(iaq) = self.air_quality {
            list.push(Measurement::new(Kind::AirQualityIndex, iaq, source));
        }
        list
    }
}

/// Converts one raw sample. Temperature goes first, its fine value feeds
/// the pressure and humidity compensation.
fn compensate(
    coefficients: &Coefficients,
    variant: Variant,
    raw: &RawSample,
    baseline: &mut GasBaselineWindow,
) -> (Reading, i16) {
    let (temperature, t_fine) = coefficients.compute_temperature(raw.adc_temperature);
    let pressure = coefficients.compute_pressure(raw.adc_pressure, t_fine);
    let humidity = coefficients.compute_humidity(raw.adc_humidity, t_fine);
    let gas = coefficients.gas_resistance(raw.adc_gas, raw.gas_range, variant);

    let mut reading = Reading {
        temperature: f32::from(temperature) / 100.0,
        pressure: pressure as f32 / 100.0,
        humidity: humidity as f32 / 1000.0,
        gas_resistance: gas as f32,
        air_quality: None,
    };

    baseline.push(reading.gas_resistance);
    if raw.heat_stable {
        reading.air_quality = baseline
            .baseline()
            .map(|base| air_quality::score(reading.humidity, reading.gas_resistance, base));
    }
    (reading, temperature)
}

struct Device<I> {
    bus: I,
    address: u8,
    variant: Variant,
    coefficients: Coefficients,
}

fn read_register<I: I2c>(bus: &mut I, address: u8, register: u8) -> Result<u8, Error> {
    let mut buf = [0u8; 1];
    bus.write_read(address, &[register], &mut buf)
        .map_err(Error::bus)?;
    Ok(buf[0])
}

/// Soft reset, identity check and the coefficient block
fn bring_up<I: I2c>(
    bus: &mut I,
    address: u8,
    delay: &mut impl DelayNs,
) -> Result<(Variant, Coefficients), Error> {
    bus.write(address, &[reg::SOFT_RESET, reg::SOFT_RESET_CMD])
        .map_err(Error::bus)?;
    delay.delay_ms(SOFT_RESET_DELAY_MS);

    let chip_id = read_register(bus, address, reg::CHIP_ID)?;
    if chip_id != reg::CHIP_ID_BME68X {
        return Err(ProtocolError::ChipId {
            got: chip_id,
            expected: reg::CHIP_ID_BME68X,
        }
        .into());
    }
    let variant = Variant::from_id(read_register(bus, address, reg::VARIANT_ID)?);

    let mut block = [0u8; reg::COEFF_LEN];
    let (first, rest) = block.split_at_mut(reg::COEFF1_LEN);
    let (second, third) = rest.split_at_mut(reg::COEFF2_LEN);
    for (register, part) in [(reg::COEFF1, first), (reg::COEFF2, second), (reg::COEFF3, third)] {
        bus.write_read(address, &[register], part)
            .map_err(Error::calibration)?;
    }
    trace!("coefficient block: {block:02x?}");

    Ok((variant, Coefficients::parse(&block)))
}

impl<I: I2c> Device<I> {
    /// Configuration is only accepted in sleep mode. A previous cycle that
    /// gave up polling may have left the chip in forced mode.
    fn ensure_sleep(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        for attempt in 0..POLL_ATTEMPTS {
            let ctrl_meas = read_register(&mut self.bus, self.address, reg::CTRL_MEAS)?;
            if ctrl_meas & reg::MODE_MSK == reg::MODE_SLEEP {
                return Ok(());
            }
            if attempt == 0 {
                debug!("bme68x not asleep ({ctrl_meas:#04x}), requesting sleep mode");
                let sleep = (ctrl_meas & !reg::MODE_MSK) | reg::MODE_SLEEP;
                self.bus
                    .write(self.address, &[reg::CTRL_MEAS, sleep])
                    .map_err(Error::bus)?;
            }
            delay.delay_ms(POLL_INTERVAL_MS);
        }
        Err(ProtocolError::NotAsleep(POLL_ATTEMPTS).into())
    }

    /// Writes the full configuration as register/value pairs in one
    /// transfer while in sleep mode, then triggers a forced measurement.
    fn configure(
        &mut self,
        delay: &mut impl DelayNs,
        settings: &Settings,
        heater_code: u8,
    ) -> Result<(), Error> {
        self.ensure_sleep(delay)?;

        let run_gas = match self.variant {
            Variant::GasLow => reg::RUN_GAS_LOW,
            Variant::GasHigh => reg::RUN_GAS_HIGH,
        };
        let ctrl_meas = (settings.temperature_oversampling.code() << reg::OSRS_T_POS)
            | (settings.pressure_oversampling.code() << reg::OSRS_P_POS);

        let pairs = [
            reg::RES_HEAT0,
            heater_code,
            reg::GAS_WAIT0,
            heater_duration_code(settings.heater_duration),
            reg::CTRL_GAS_1,
            (run_gas << reg::RUN_GAS_POS) | reg::NB_CONV,
            reg::CTRL_HUM,
            settings.humidity_oversampling.code(),
            reg::CONFIG,
            reg::FILTER_SIZE_3 << reg::FILTER_POS,
            reg::CTRL_MEAS,
            ctrl_meas | reg::MODE_SLEEP,
        ];
        self.bus.write(self.address, &pairs).map_err(Error::bus)?;
        self.bus
            .write(self.address, &[reg::CTRL_MEAS, ctrl_meas | reg::MODE_FORCED])
            .map_err(Error::bus)
    }

    fn wait_for_field(&mut self, delay: &mut impl DelayNs) -> Result<[u8; reg::FIELD_LEN], Error> {
        for attempt in 0..POLL_ATTEMPTS {
            if attempt > 0 {
                delay.delay_ms(POLL_INTERVAL_MS);
            }
            let status = read_register(&mut self.bus, self.address, reg::FIELD0)?;
            if status & reg::NEW_DATA_MSK == 0 {
                continue;
            }

            let mut field = [0u8; reg::FIELD_LEN];
            self.bus
                .write_read(self.address, &[reg::FIELD0], &mut field)
                .map_err(Error::bus)?;
            return Ok(field);
        }
        Err(ProtocolError::NoNewData(POLL_ATTEMPTS).into())
    }
}

pub struct Bme68x<I, D> {
    delay: D,
    settings: Settings,
    claimed: bool,
    device: Option<Device<I>>,
    /// whole °C, from the last reading
    ambient: i32,
    baseline: GasBaselineWindow,
    last: Option<Reading>,
    errors: ErrorCounts,
}

impl<I: I2c, D: DelayNs> Bme68x<I, D> {
    pub fn new(delay: D) -> Self {
        Self {
            delay,
            settings: Settings::default(),
            claimed: false,
            device: None,
            ambient: DEFAULT_AMBIENT,
            baseline: GasBaselineWindow::default(),
            last: None,
            errors: ErrorCounts::default(),
        }
    }

    /// Changes the heater profile, takes effect from the next sample.
    pub fn set_heater(&mut self, temperature: u16, duration_ms: u16) -> Result<(), Error> {
        if temperature > heater::MAX_TEMPERATURE {
            return Err(RangeError::HeaterTemperature(temperature).into());
        }
        self.settings.heater_temperature = temperature;
        self.settings.heater_duration = duration_ms;
        Ok(())
    }

    pub fn with_heater(mut self, temperature: u16, duration_ms: u16) -> Result<Self, Error> {
        self.set_heater(temperature, duration_ms)?;
        Ok(self)
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn variant(&self) -> Option<Variant> {
        self.device.as_ref().map(|device| device.variant)
    }

    #[must_use]
    pub fn coefficients(&self) -> Option<&Coefficients> {
        self.device.as_ref().map(|device| &device.coefficients)
    }

    #[must_use]
    pub fn baseline(&self) -> &GasBaselineWindow {
        &self.baseline
    }

    /// Runs one full forced measurement cycle.
    pub fn measure(&mut self) -> Result<Reading, Error> {
        let device = self.device.as_mut().ok_or(Error::NotInitialized)?;
        let heater_code = device
            .coefficients
            .heater_resistance_code(self.settings.heater_temperature, self.ambient)?;
        device.configure(&mut self.delay, &self.settings, heater_code)?;

        let heating_us = u32::from(self.settings.heater_duration) * 1000;
        self.delay
            .delay_us(self.settings.measurement_duration() + heating_us);

        let field = device.wait_for_field(&mut self.delay)?;
        let raw = RawSample::parse(&field, device.variant);
        debug!("bme68x raw sample: {raw:?}");
        if !raw.gas_valid {
            debug!("bme68x gas measurement flagged invalid");
        }

        let (reading, temperature) =
            compensate(&device.coefficients, device.variant, &raw, &mut self.baseline);
        self.ambient = i32::from(temperature) / 100;
        Ok(reading)
    }
}

impl<I: I2c, D: DelayNs> Sensor<I> for Bme68x<I, D> {
    fn name(&self) -> &'static str {
        "bme68x"
    }

    fn matches_family(&self, token: &str) -> bool {
        token.len() == 6 && token.to_lowercase().starts_with("bme68")
    }

    fn initialize(&mut self, mut bus: I, address: u8) -> Result<(), Error> {
        if self.claimed {
            return Err(Error::AlreadyInitialized);
        }
        self.claimed = true;

        let (variant, coefficients) = bring_up(&mut bus, address, &mut self.delay)?;
        info!("Bosch BME68x at {address:#04x}, variant: {variant:?}");
        self.device = Some(Device {
            bus,
            address,
            variant,
            coefficients,
        });
        Ok(())
    }

    fn collect(&mut self) -> Vec<Measurement> {
        match self.measure() {
            Ok(reading) => self.last = Some(reading),
            Err(err) => {
                warn!("Could not read bme68x sample: {err}");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_measurement_duration() {
        assert_eq!(Settings::default().measurement_duration(), 32_775);
    }

    #[test]
    fn raw_sample_follows_variant() {
        let mut field = [0u8; reg::FIELD_LEN];
        field[13] = 0x96;
        field[14] = 0x35;
        field[15] = 0xff;
        field[16] = 0xc2;

        let low = RawSample::parse(&field, Variant::GasLow);
        assert_eq!(low.adc_gas, 600);
        assert_eq!(low.gas_range, 5);
        assert!(low.gas_valid);
        assert!(low.heat_stable);

        let high = RawSample::parse(&field, Variant::GasHigh);
        assert_eq!(high.adc_gas, 1023);
        assert_eq!(high.gas_range, 2);
        assert!(!high.gas_valid);
        assert!(!high.heat_stable);
    }

    #[test]
    fn family_tokens() {
        let bme: Bme68x<embedded_hal_mock::eh1::i2c::Mock, NoDelay> = Bme68x::new(NoDelay);
        assert!(bme.matches_family("bme680"));
        assert!(bme.matches_family("BME688"));
        assert!(!bme.matches_family("bme280"));
    }

    #[test]
    fn heater_limit_checked_up_front() {
        let bme: Bme68x<embedded_hal_mock::eh1::i2c::Mock, NoDelay> = Bme68x::new(NoDelay);
        assert_eq!(
            bme.with_heater(401, 150).err(),
            Some(RangeError::HeaterTemperature(401).into())
        );
    }

    struct NoDelay;
    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _: u32) {}
    }
}
