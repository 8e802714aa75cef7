//! A per-layer filter that keeps a misbehaving sensor from flooding the log.
//!
//! Events pass three budgets in turn: one shared by everything, one per
//! callsite and one per distinct message. Each budget holds a burst of
//! events and regains one event per period. Once an exhausted budget has
//! recovered the number of events it swallowed is printed to stderr.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::hash::{DefaultHasher, Hasher};
use std::num::NonZeroU32;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::field::{Field, Visit};
use tracing::{Event, Metadata, Subscriber};
use tracing_core::{callsite, Interest};
use tracing_subscriber::layer::Context;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

pub const fn nonzero(n: u32) -> NonZeroU32 {
    match NonZeroU32::new(n) {
        Some(n) => n,
        None => panic!("burst size must be at least one"),
    }
}

/// A burst of `burst` events refilling at one event per `period`. A zero
/// period means no limit at all.
#[derive(Debug, Clone, Copy)]
pub struct Allowance {
    pub period: Duration,
    pub burst: NonZeroU32,
}

impl Allowance {
    pub const fn new(period: Duration, burst: NonZeroU32) -> Self {
        Self { period, burst }
    }

    pub const fn unlimited() -> Self {
        Self::new(Duration::ZERO, nonzero(1))
    }

    fn quota(&self) -> Option<Quota> {
        Quota::with_period(self.period).map(|quota| quota.allow_burst(self.burst))
    }
}

const DEFAULT_GLOBAL: Allowance = Allowance::new(Duration::from_millis(100), nonzero(20));
const DEFAULT_CALLSITE: Allowance = Allowance::new(Duration::from_secs(1), nonzero(10));
const DEFAULT_MESSAGE: Allowance = Allowance::new(Duration::from_secs(5), nonzero(3));

struct Budget {
    limiter: Option<DirectLimiter>,
    suppressed: usize,
}

impl Budget {
    fn new(allowance: &Allowance) -> Self {
        Self {
            limiter: allowance.quota().map(RateLimiter::direct),
            suppressed: 0,
        }
    }

    fn admit(&mut self, scope: &str) -> bool {
        let Some(limiter) = &self.limiter else {
            return true;
        };

        if limiter.check().is_err() {
            self.suppressed += 1;
            return false;
        }
        if self.suppressed > 0 {
            eprintln!(
                "Logging is rate limited ({scope}), suppressed {} messages",
                self.suppressed
            );
            self.suppressed = 0;
        }
        true
    }
}

struct Budgets {
    global: Budget,
    callsites: HashMap<callsite::Identifier, Budget>,
    messages: HashMap<(callsite::Identifier, u64), Budget>,
}

pub struct Limiter {
    budgets: Mutex<Budgets>,
    callsite: Allowance,
    message: Allowance,
}

impl Default for Limiter {
    fn default() -> Self {
        Self {
            budgets: Mutex::new(Budgets {
                global: Budget::new(&DEFAULT_GLOBAL),
                callsites: HashMap::new(),
                messages: HashMap::new(),
            }),
            callsite: DEFAULT_CALLSITE,
            message: DEFAULT_MESSAGE,
        }
    }
}

impl Limiter {
    fn budgets(&self) -> std::sync::MutexGuard<'_, Budgets> {
        self.budgets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn with_global(self, allowance: Allowance) -> Self {
        self.budgets().global = Budget::new(&allowance);
        self
    }

    #[must_use]
    pub fn with_callsite(mut self, allowance: Allowance) -> Self {
        self.callsite = allowance;
        self.budgets().callsites.clear();
        self
    }

    #[must_use]
    pub fn with_message(mut self, allowance: Allowance) -> Self {
        self.message = allowance;
        self.budgets().messages.clear();
        self
    }

    fn admit(&self, event: &Event<'_>) -> bool {
        let mut budgets = self.budgets();
        if !budgets.global.admit("all messages") {
            return false;
        }

        let callsite = event.metadata().callsite();
        let admitted = budgets
            .callsites
            .entry(callsite.clone())
            .or_insert_with(|| Budget::new(&self.callsite))
            .admit("this callsite");
        if !admitted {
            return false;
        }

        let message = message_hash(event);
        budgets
            .messages
            .entry((callsite, message))
            .or_insert_with(|| Budget::new(&self.message))
            .admit("this exact message")
    }
}

impl<S: Subscriber> tracing_subscriber::layer::Filter<S> for Limiter {
    fn enabled(&self, _: &Metadata<'_>, _: &Context<'_, S>) -> bool {
        // decided per event in event_enabled
        true
    }

    fn event_enabled(&self, event: &Event<'_>, _: &Context<'_, S>) -> bool {
        self.admit(event)
    }

    fn callsite_enabled(&self, _: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }
}

/// Hashes the formatted fields without allocating a string for them
struct FieldHasher(DefaultHasher);

impl Write for FieldHasher {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write(s.as_bytes());
        Ok(())
    }
}

impl Visit for FieldHasher {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // writing into a hasher can not fail
        let _ = write!(self, "{}={value:?};", field.name());
    }
}

fn message_hash(event: &Event<'_>) -> u64 {
    let mut hasher = FieldHasher(DefaultHasher::new());
    event.record(&mut hasher);
    hasher.0.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Layer;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn budget_runs_out_after_burst() {
        let mut budget = Budget::new(&Allowance::new(HOUR, nonzero(2)));
        assert!(budget.admit("test"));
        assert!(budget.admit("test"));
        assert!(!budget.admit("test"));
        assert!(!budget.admit("test"));
        assert_eq!(budget.suppressed, 2);
    }

    #[test]
    fn zero_period_never_limits() {
        let mut budget = Budget::new(&Allowance::unlimited());
        assert!((0..1000).all(|_| budget.admit("test")));
    }

    struct Count(Arc<AtomicUsize>);

    impl<S: Subscriber> tracing_subscriber::Layer<S> for Count {
        fn on_event(&self, _: &Event<'_>, _: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn repeated_message_is_suppressed() {
        let seen = Arc::new(AtomicUsize::new(0));
        let limiter = Limiter::default().with_message(Allowance::new(HOUR, nonzero(3)));
        let subscriber =
            tracing_subscriber::registry().with(Count(Arc::clone(&seen)).with_filter(limiter));

        tracing::subscriber::with_default(subscriber, || {
            for _ in 0..8 {
                tracing::warn!("bus transfer failed");
            }
            tracing::warn!("something else went wrong");
        });
        assert_eq!(seen.load(Ordering::Relaxed), 4);
    }
}
