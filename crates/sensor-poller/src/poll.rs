use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sensors::{Measurement, Sensor};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::discovery::Driver;

/// Polls every driver in order, forever, on its own thread. Stops once the
/// receiving side is gone.
pub fn start<I: 'static>(
    mut drivers: Vec<Driver<I>>,
    interval: Duration,
    tx: mpsc::Sender<Vec<Measurement>>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        let started = Instant::now();
        let batch = poll_once(&mut drivers);
        if tx.blocking_send(batch).is_err() {
            debug!("Nobody listening for measurements anymore, stopping");
            return;
        }

        let elapsed = started.elapsed();
        match remaining(interval, elapsed) {
            Some(left) => thread::sleep(left),
            None => warn!(
                "Polling took {elapsed:?} which is longer than the \
                interval ({interval:?}), starting next round right away"
            ),
        }
    })
}

pub fn poll_once<I>(drivers: &mut [Driver<I>]) -> Vec<Measurement> {
    drivers.iter_mut().flat_map(|driver| driver.collect()).collect()
}

/// `None` on overrun
fn remaining(interval: Duration, elapsed: Duration) -> Option<Duration> {
    if elapsed > interval {
        None
    } else {
        Some(interval - elapsed)
    }
}

#[cfg(test)]
mod tests {
    use sensors::{Error, ErrorCounts, Kind};

    use super::*;

    struct Fixed {
        value: f64,
        errors: ErrorCounts,
    }

    impl Sensor<()> for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn matches_family(&self, token: &str) -> bool {
            token == "fixed"
        }

        fn initialize(&mut self, _: (), _: u8) -> Result<(), Error> {
            Ok(())
        }

        fn collect(&mut self) -> Vec<Measurement> {
            vec![Measurement::new(Kind::Temperature, self.value, "fixed")]
        }

        fn error_counts(&self) -> &ErrorCounts {
            &self.errors
        }
    }

    fn fixed(value: f64) -> Driver<()> {
        Box::new(Fixed {
            value,
            errors: ErrorCounts::default(),
        })
    }

    #[test]
    fn batch_keeps_driver_order() {
        let mut drivers = vec![fixed(1.0), fixed(2.0), fixed(3.0)];
        let batch = poll_once(&mut drivers);
        let values: Vec<_> = batch.iter().map(|m| m.value).collect();
        assert_eq!(values, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn sleeps_the_remainder() {
        let interval = Duration::from_secs(10);
        assert_eq!(
            remaining(interval, Duration::from_secs(3)),
            Some(Duration::from_secs(7))
        );
        assert_eq!(remaining(interval, interval), Some(Duration::ZERO));
        assert_eq!(remaining(interval, Duration::from_secs(11)), None);
    }

    #[test]
    fn stops_when_receiver_is_dropped() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = start(vec![fixed(21.5)], Duration::from_millis(1), tx);
        let batch = rx.blocking_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, Kind::Temperature);
        drop(rx);
        handle.join().unwrap();
    }
}
