use sensors::Measurement;
use tracing::info;

/// Receives every batch the polling thread produces
pub trait Exporter {
    fn export(&mut self, batch: &[Measurement]);
}

pub struct LogExporter;

impl Exporter for LogExporter {
    fn export(&mut self, batch: &[Measurement]) {
        for measurement in batch {
            info!("{measurement}");
        }
    }
}
