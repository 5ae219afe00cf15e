//! Background refresh of unfinished-work metrics.
//!
//! Runs on its own thread so the gauges move even while every consumer is
//! stuck in a long handler. Holds only a weak reference to the queue and
//! exits on the first tick after shutdown or after the last handle drops.

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::Shared;
use crate::clock::{Clock, Ticker};

pub(super) fn spawn<K>(shared: &Arc<Shared<K>>, clock: &dyn Clock, period: Duration)
where
    K: Eq + Hash + Clone + Send + 'static,
{
    let ticker = clock.ticker(period);
    let queue = Arc::downgrade(shared);
    let name = shared.name.clone();

    let spawned = thread::Builder::new()
        .name(format!("dedupq-reporter-{name}"))
        .spawn(move || run(queue, ticker));

    if let Err(e) = spawned {
        warn!(queue = %name, error = %e, "failed to start unfinished work reporter");
    }
}

fn run<K>(queue: Weak<Shared<K>>, mut ticker: Box<dyn Ticker>)
where
    K: Eq + Hash + Clone,
{
    while ticker.tick() {
        let Some(shared) = queue.upgrade() else {
            return;
        };
        let mut state = shared.state.lock();
        if state.is_shutting_down() {
            debug!(queue = %shared.name, "unfinished work reporter stopped");
            return;
        }
        state.update_unfinished_work();
    }
}
