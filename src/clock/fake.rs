//! A manually driven clock for deterministic tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{Clock, MIN_TICK_PERIOD, Ticker, next_deadline};

/// Clock whose time only moves when [`FakeClock::step`] or
/// [`FakeClock::set`] is called.
///
/// Clones share the same time and tickers.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    fired: Condvar,
}

struct State {
    now: Instant,
    next_id: u64,
    tickers: Vec<Slot>,
}

struct Slot {
    id: u64,
    period: Duration,
    deadline: Instant,
    pending: bool,
}

impl FakeClock {
    /// Create a clock frozen at the current real instant.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a clock frozen at `now`.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    now,
                    next_id: 0,
                    tickers: Vec::new(),
                }),
                fired: Condvar::new(),
            }),
        }
    }

    /// Advance time by `d`, firing every ticker whose deadline has passed.
    pub fn step(&self, d: Duration) {
        let mut state = self.inner.state.lock();
        let now = state.now + d;
        state.now = now;
        self.fire_due(&mut state, now);
    }

    /// Jump to `now`. Moving backwards is allowed and fires nothing.
    pub fn set(&self, now: Instant) {
        let mut state = self.inner.state.lock();
        state.now = now;
        self.fire_due(&mut state, now);
    }

    /// Number of tickers currently alive on this clock.
    pub fn ticker_count(&self) -> usize {
        self.inner.state.lock().tickers.len()
    }

    fn fire_due(&self, state: &mut State, now: Instant) {
        let mut any = false;
        for slot in &mut state.tickers {
            if slot.deadline <= now {
                slot.pending = true;
                slot.deadline = next_deadline(slot.deadline, slot.period, now);
                any = true;
            }
        }
        if any {
            self.inner.fired.notify_all();
        }
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.state.lock().now
    }

    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        let period = period.max(MIN_TICK_PERIOD);
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let deadline = state.now + period;
        state.tickers.push(Slot {
            id,
            period,
            deadline,
            pending: false,
        });
        Box::new(FakeTicker {
            id,
            inner: Arc::clone(&self.inner),
        })
    }
}

struct FakeTicker {
    id: u64,
    inner: Arc<Inner>,
}

impl Ticker for FakeTicker {
    fn tick(&mut self) -> bool {
        let mut state = self.inner.state.lock();
        loop {
            let Some(slot) = state.tickers.iter_mut().find(|s| s.id == self.id) else {
                return false;
            };
            if slot.pending {
                slot.pending = false;
                return true;
            }
            self.inner.fired.wait(&mut state);
        }
    }
}

impl Drop for FakeTicker {
    fn drop(&mut self) {
        self.inner.state.lock().tickers.retain(|s| s.id != self.id);
    }
}
