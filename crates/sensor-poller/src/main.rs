use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use linux_embedded_hal::{Delay, I2cdev};
use sensors::SharedBus;
use tokio::sync::mpsc;
use tracing::info;

mod discovery;
mod export;
mod poll;

use discovery::{Catalog, Options, SensorArg};
use export::{Exporter, LogExporter};

#[derive(Parser)]
#[command(name = "sensor poller")]
#[command(version = "1.0")]
#[command(about = "Polls environmental sensors on an i2c bus and reports what they measure")]
struct Cli {
    /// The i2c bus device the sensors are connected to
    #[arg(short, long, default_value = "/dev/i2c-1")]
    bus: PathBuf,

    /// Seconds between two polls of all sensors
    #[arg(short, long, default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// A sensor to poll as family@address, for example scd41@0x62 or
    /// bme680@118. Pass once per sensor.
    #[arg(short, long = "sensor", required = true)]
    sensors: Vec<SensorArg>,

    /// Keep going without the sensors that fail to initialize
    #[arg(long)]
    skip_failed: bool,

    /// Target temperature of the gas sensor's hot plate in °C
    #[arg(long, default_value_t = 320)]
    heater_temp: u16,

    /// How long the gas sensor's hot plate is heated, in milliseconds
    #[arg(long, default_value_t = 150)]
    heater_duration: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logger::tracing::setup();

    let catalog = Catalog::new(
        || Delay,
        Options {
            heater_temperature: cli.heater_temp,
            heater_duration: cli.heater_duration,
        },
    );
    info!("Supported sensors: {}", catalog.supported().join(", "));

    let bus = I2cdev::new(&cli.bus)
        .wrap_err_with(|| format!("Could not open i2c bus: {}", cli.bus.display()))?;
    let bus = SharedBus::new(bus);
    let drivers = discovery::attach(&catalog, &bus, &cli.sensors, cli.skip_failed)?;

    let (tx, mut rx) = mpsc::channel(100);
    let _poller = poll::start(drivers, Duration::from_secs(cli.interval), tx);
    let mut exporters: Vec<Box<dyn Exporter>> = vec![Box::new(LogExporter)];

    loop {
        tokio::select! {
            batch = rx.recv() => {
                let batch = batch.ok_or_else(|| eyre!("Polling thread stopped"))?;
                for exporter in &mut exporters {
                    exporter.export(&batch);
                }
            }
            res = tokio::signal::ctrl_c() => {
                res.wrap_err("Could not listen for ctrl-c")?;
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}
