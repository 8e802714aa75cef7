//! Which drivers exist and how a command line token picks one.

use std::str::FromStr;

use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use sensors::{Bme68x, Error, Pmsa003i, Scd4x, Sen5x, Sensor, SharedBus};
use tracing::{info, warn};

pub type Driver<I> = Box<dyn Sensor<I> + Send>;
type Constructor<I, D> = fn(D, &Options) -> Result<Driver<I>, Error>;

/// Settings some drivers need before they are initialized
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// °C
    pub heater_temperature: u16,
    /// ms
    pub heater_duration: u16,
}

/// A sensor requested on the command line: `family@address`, the address
/// either decimal or hex prefixed with `0x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorArg {
    pub family: String,
    pub address: u8,
}

impl FromStr for SensorArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, address) = s
            .split_once('@')
            .ok_or_else(|| format!("expected family@address, got: {s}"))?;
        let address = match address.strip_prefix("0x") {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => address.parse(),
        }
        .map_err(|e| format!("invalid address {address}: {e}"))?;
        if address > 0x7f {
            return Err(format!("address {address:#04x} is not a 7 bit i2c address"));
        }
        if family.is_empty() {
            return Err("sensor family may not be empty".to_string());
        }

        Ok(Self {
            family: family.to_string(),
            address,
        })
    }
}

/// Every driver this program knows, in the order they are tried.
pub struct Catalog<I, D> {
    constructors: Vec<Constructor<I, D>>,
    make_delay: fn() -> D,
    options: Options,
}

impl<I, D> Catalog<I, D>
where
    I: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    pub fn new(make_delay: fn() -> D, options: Options) -> Self {
        Self {
            constructors: vec![
                scd4x as Constructor<I, D>,
                sen5x,
                pmsa003i,
                bme68x,
            ],
            make_delay,
            options,
        }
    }

    /// The first driver that claims the family token
    pub fn sniff(&self, token: &str) -> Result<Option<Driver<I>>, Error> {
        for construct in &self.constructors {
            let driver = construct((self.make_delay)(), &self.options)?;
            if driver.matches_family(token) {
                return Ok(Some(driver));
            }
        }
        Ok(None)
    }

    pub fn supported(&self) -> Vec<&'static str> {
        self.constructors
            .iter()
            .filter_map(|construct| construct((self.make_delay)(), &self.options).ok())
            .map(|driver| driver.name())
            .collect()
    }
}

fn scd4x<I, D>(delay: D, _: &Options) -> Result<Driver<I>, Error>
where
    I: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    Ok(Box::new(Scd4x::<I, D>::new(delay)))
}

fn sen5x<I, D>(delay: D, _: &Options) -> Result<Driver<I>, Error>
where
    I: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    Ok(Box::new(Sen5x::<I, D>::new(delay)))
}

fn pmsa003i<I, D>(_: D, _: &Options) -> Result<Driver<I>, Error>
where
    I: I2c + Send + 'static,
{
    Ok(Box::new(Pmsa003i::<I>::new()))
}

fn bme68x<I, D>(delay: D, options: &Options) -> Result<Driver<I>, Error>
where
    I: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    let bme = Bme68x::<I, D>::new(delay)
        .with_heater(options.heater_temperature, options.heater_duration)?;
    Ok(Box::new(bme))
}

/// Creates and initializes a driver per requested sensor, each with its own
/// handle to the bus. A failed initialization aborts unless `skip_failed` is set.
pub fn attach<T, D>(
    catalog: &Catalog<sensors::BusHandle<T>, D>,
    bus: &SharedBus<T>,
    requested: &[SensorArg],
    skip_failed: bool,
) -> Result<Vec<Driver<sensors::BusHandle<T>>>>
where
    T: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    let mut drivers = Vec::new();
    for SensorArg { family, address } in requested {
        let Some(mut driver) = catalog
            .sniff(family)
            .wrap_err("invalid driver options")?
        else {
            return Err(eyre!(
                "unsupported sensor family: {family}, supported are: {}",
                catalog.supported().join(", ")
            ));
        };

        match driver.initialize(bus.handle(), *address) {
            Ok(()) => {
                info!("Attached {} at {address:#04x}", driver.name());
                drivers.push(driver);
            }
            Err(err) if skip_failed => {
                warn!(
                    "Skipping {} at {address:#04x}, could not initialize: {err}",
                    driver.name()
                );
            }
            Err(err) => {
                return Err(err).wrap_err_with(|| {
                    format!("could not initialize {} at {address:#04x}", driver.name())
                })
            }
        }
    }

    if drivers.is_empty() {
        bail!("no sensors left to poll");
    }
    Ok(drivers)
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    use super::*;

    struct NoDelay;
    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _: u32) {}
    }

    const OPTIONS: Options = Options {
        heater_temperature: 320,
        heater_duration: 150,
    };

    #[test]
    fn parse_sensor_arg() {
        assert_eq!(
            "scd41@0x62".parse(),
            Ok(SensorArg {
                family: "scd41".to_string(),
                address: 0x62
            })
        );
        assert_eq!(
            "pmsa003i@18".parse::<SensorArg>().map(|s| s.address),
            Ok(0x12)
        );
        assert!("scd41".parse::<SensorArg>().is_err());
        assert!("scd41@0x80".parse::<SensorArg>().is_err());
        assert!("@0x62".parse::<SensorArg>().is_err());
    }

    #[test]
    fn sniff_picks_the_family() {
        let catalog: Catalog<Mock, _> = Catalog::new(|| NoDelay, OPTIONS);
        let name = |token: &str| catalog.sniff(token).unwrap().map(|d| d.name());
        assert_eq!(name("scd41"), Some("scd4x"));
        assert_eq!(name("SEN55"), Some("sen5x"));
        assert_eq!(name("pmsa003i"), Some("pmsa003i"));
        assert_eq!(name("bme688"), Some("bme68x"));
        assert_eq!(name("bmp280"), None);
        assert_eq!(catalog.supported(), ["scd4x", "sen5x", "pmsa003i", "bme68x"]);
    }

    #[test]
    fn heater_limit_rejected() {
        let options = Options {
            heater_temperature: 450,
            ..OPTIONS
        };
        let catalog: Catalog<Mock, _> = Catalog::new(|| NoDelay, options);
        assert!(catalog.sniff("bme680").is_err());
        assert!(catalog.sniff("scd40").unwrap().is_some());
    }

    #[test]
    fn failed_sensor_skipped_on_request() {
        let expectations = [Transaction::write(0x76, vec![0xe0, 0xb6])
            .with_error(embedded_hal::i2c::ErrorKind::Other)];
        let mut mock = Mock::new(&expectations);
        let bus = SharedBus::new(mock.clone());
        let catalog = Catalog::new(|| NoDelay, OPTIONS);
        let requested: [SensorArg; 2] = [
            "bme680@0x76".parse().unwrap(),
            "pmsa003i@0x12".parse().unwrap(),
        ];

        let drivers = attach(&catalog, &bus, &requested, true).unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].name(), "pmsa003i");
        mock.done();
    }
}
