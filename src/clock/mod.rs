//! Time sources used by the queue's instrumentation.
//!
//! The queue itself never reads the clock; only metrics timestamps and the
//! periodic unfinished-work reporter do. Tests swap in [`FakeClock`].

mod fake;

pub use fake::FakeClock;

use std::time::{Duration, Instant};

/// Shortest period a ticker runs at; shorter requests are raised to this.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// A source of monotonic time and periodic ticks.
pub trait Clock: Send + Sync {
    /// Current instant according to this clock.
    fn now(&self) -> Instant;

    /// Start a ticker firing every `period`, raised to at least
    /// [`MIN_TICK_PERIOD`].
    fn ticker(&self, period: Duration) -> Box<dyn Ticker>;
}

/// A periodic tick stream, consumed from a single thread.
pub trait Ticker: Send {
    /// Block until the next tick. Returns `false` once the ticker can no
    /// longer fire.
    ///
    /// Ticks that were missed while nobody was waiting coalesce into one.
    fn tick(&mut self) -> bool;
}

/// The process monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        let period = period.max(MIN_TICK_PERIOD);
        Box::new(RealTicker {
            period,
            next: Instant::now() + period,
        })
    }
}

struct RealTicker {
    period: Duration,
    next: Instant,
}

impl Ticker for RealTicker {
    fn tick(&mut self) -> bool {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        }

        // Schedule off the previous deadline so ticks don't drift, skipping
        // any we slept through.
        self.next = next_deadline(self.next, self.period, Instant::now());
        true
    }
}

/// First deadline on `deadline`'s period grid that lies after `now`, at
/// least one period past `deadline`.
pub(crate) fn next_deadline(deadline: Instant, period: Duration, now: Instant) -> Instant {
    let behind = now.saturating_duration_since(deadline).as_nanos();
    let periods = behind / period.as_nanos() + 1;
    let skip = period.as_nanos().saturating_mul(periods);
    deadline + Duration::from_nanos(u64::try_from(skip).unwrap_or(u64::MAX))
}
