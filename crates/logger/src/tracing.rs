use std::time::Duration;

use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::ratelimited::{nonzero, Allowance, Limiter};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_regex(true)
        .try_from_env()
        .unwrap_or_else(|_| {
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .parse_lossy("")
        })
}

/// A sensor that fails does so every poll. Allow a few repeats so the
/// pattern is visible, then stay quiet until it changes.
fn limiter() -> Limiter {
    Limiter::default()
        .with_global(Allowance::new(Duration::from_millis(50), nonzero(40)))
        .with_callsite(Allowance::new(Duration::from_secs(5), nonzero(10)))
        .with_message(Allowance::new(Duration::from_secs(60), nonzero(3)))
}

/// Logs to the systemd journal when running as a service, otherwise to
/// stderr. Verbosity follows `RUST_LOG` (default `info`), for example:
///
/// `RUST_LOG=sensors::bosch=trace,info`
///
/// To follow the service:
/// `journalctl -fu sensor-poller --output-fields=CODE_FILE,CODE_LINE,MESSAGE -o cat`
pub fn setup() {
    let fmt = fmt::layer()
        .pretty()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    let registry = tracing_subscriber::registry().with(ErrorLayer::default());

    if !libsystemd::logging::connected_to_journal() {
        registry
            .with(fmt.with_filter(limiter()).with_filter(env_filter()))
            .init();
        tracing::info!("Logging to stderr");
        return;
    }

    match tracing_journald::layer() {
        Ok(journal) => {
            registry
                .with(journal.with_filter(limiter()).with_filter(env_filter()))
                .init();
            tracing::info!("Logging to journald");
        }
        Err(err) => {
            registry
                .with(fmt.with_filter(limiter()).with_filter(env_filter()))
                .init();
            tracing::error!(
                "Could not connect to journald, logging to stderr instead: {err}"
            );
        }
    }
}

/// Captured per test by the test harness. Safe to call from every test.
pub fn setup_for_tests() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = color_eyre::install();

        let test_writer = fmt::layer()
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .pretty()
            .with_filter(EnvFilter::from_default_env());
        let _ = tracing_subscriber::registry()
            .with(test_writer)
            .with(ErrorLayer::default())
            .try_init();
    })
}
