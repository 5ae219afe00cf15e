//! The queue's state machine: ordering store, pending set, in-flight set.
//!
//! Everything here runs under the queue lock. Methods report whether a
//! consumer should be woken; the caller owns signalling.
//!
//! Metrics hooks run after the sets are updated and a panicking hook is
//! contained, so user instrumentation can never leave a key stranded.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::metrics::QueueMetrics;

pub(crate) struct State<K> {
    /// Order in which keys are handed out. Every key here is in `dirty`
    /// and not in `processing`.
    queue: VecDeque<K>,
    /// Keys that need processing, queued or waiting for their current
    /// round to finish.
    dirty: HashSet<K>,
    /// Keys checked out by a consumer. A key may also be in `dirty`; it is
    /// re-queued when its consumer calls done.
    processing: HashSet<K>,
    shutting_down: bool,
    metrics: Box<dyn QueueMetrics<K>>,
}

impl<K> State<K>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new(metrics: Box<dyn QueueMetrics<K>>) -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            shutting_down: false,
            metrics,
        }
    }

    /// Mark `key` as needing processing. Returns `true` if it was appended
    /// to the ordering store.
    pub(crate) fn add(&mut self, key: K) -> bool {
        if self.shutting_down || self.dirty.contains(&key) {
            return false;
        }

        self.dirty.insert(key.clone());
        self.notify("add", |m| m.add(&key));

        if self.processing.contains(&key) {
            // Picked up again by `done`.
            return false;
        }

        self.queue.push_back(key);
        true
    }

    /// Move the head of the ordering store into the in-flight set.
    pub(crate) fn pop(&mut self) -> Option<K> {
        let key = self.queue.pop_front()?;
        self.dirty.remove(&key);
        self.processing.insert(key.clone());
        self.notify("get", |m| m.get(&key));
        Some(key)
    }

    /// Release `key` from the in-flight set. Returns `true` if it was
    /// re-dirtied meanwhile and has been appended to the ordering store.
    pub(crate) fn done(&mut self, key: &K) -> bool {
        // A key that was never checked out is either absent or already
        // queued; re-queueing it would duplicate it.
        let requeued = self.processing.remove(key) && self.dirty.contains(key);
        if requeued {
            self.queue.push_back(key.clone());
        }

        self.notify("done", |m| m.done(key));
        requeued
    }

    /// Flip the shutdown flag. Returns `true` on the first call only.
    pub(crate) fn shut_down(&mut self) -> bool {
        !std::mem::replace(&mut self.shutting_down, true)
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.processing.len()
    }

    /// Nothing queued and nothing checked out.
    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.processing.is_empty()
    }

    pub(crate) fn update_unfinished_work(&mut self) {
        self.notify("update_unfinished_work", |m| m.update_unfinished_work());
    }

    fn notify(&mut self, event: &'static str, hook: impl FnOnce(&mut Box<dyn QueueMetrics<K>>)) {
        let metrics = &mut self.metrics;
        if panic::catch_unwind(AssertUnwindSafe(|| hook(metrics))).is_err() {
            warn!(event, "queue metrics hook panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopMetrics;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn state() -> State<&'static str> {
        State::new(Box::new(NoopMetrics))
    }

    fn queued(s: &State<&'static str>) -> Vec<&'static str> {
        s.queue.iter().copied().collect()
    }

    fn assert_invariants(s: &State<&'static str>) {
        let mut seen = HashSet::new();
        for key in &s.queue {
            assert!(seen.insert(*key), "{key} queued twice");
            assert!(s.dirty.contains(key), "{key} queued but not dirty");
            assert!(!s.processing.contains(key), "{key} queued while in flight");
        }
    }

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl QueueMetrics<&'static str> for Recorder {
        fn add(&mut self, key: &&'static str) {
            self.0.lock().push(format!("add {key}"));
        }
        fn get(&mut self, key: &&'static str) {
            self.0.lock().push(format!("get {key}"));
        }
        fn done(&mut self, key: &&'static str) {
            self.0.lock().push(format!("done {key}"));
        }
        fn update_unfinished_work(&mut self) {
            self.0.lock().push("tick".to_string());
        }
    }

    #[test]
    fn duplicate_add_collapses() {
        let mut s = state();
        assert!(s.add("a"));
        assert!(!s.add("a"));
        assert_eq!(queued(&s), ["a"]);
        assert_invariants(&s);
    }

    #[test]
    fn readd_while_in_flight_requeues_at_tail_on_done() {
        let mut s = state();
        s.add("a");
        s.add("b");
        s.add("a");
        assert_eq!(queued(&s), ["a", "b"]);

        assert_eq!(s.pop(), Some("a"));
        assert!(s.processing.contains("a"));
        assert!(!s.dirty.contains("a"));

        assert!(!s.add("a"));
        assert!(s.dirty.contains("a"));
        assert_eq!(queued(&s), ["b"]);
        assert_invariants(&s);

        assert!(s.done(&"a"));
        assert_eq!(queued(&s), ["b", "a"]);
        assert_invariants(&s);

        assert_eq!(s.pop(), Some("b"));
        assert_eq!(s.pop(), Some("a"));
        assert_eq!(s.pop(), None);
    }

    #[test]
    fn done_without_readd_leaves_no_trace() {
        let mut s = state();
        s.add("k");
        assert_eq!(s.pop(), Some("k"));
        assert!(!s.done(&"k"));
        assert!(s.queue.is_empty());
        assert!(s.dirty.is_empty());
        assert!(s.processing.is_empty());
        assert!(s.is_idle());
    }

    #[test]
    fn done_for_queued_key_does_not_duplicate_it() {
        let mut s = state();
        s.add("a");
        assert!(!s.done(&"a"));
        assert_eq!(queued(&s), ["a"]);
        assert_invariants(&s);
    }

    #[test]
    fn add_after_shutdown_is_ignored() {
        let mut s = state();
        s.add("a");
        assert!(s.shut_down());
        assert!(!s.shut_down());
        assert!(!s.add("c"));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn in_flight_key_stays_pending_across_shutdown() {
        let mut s = state();
        s.add("a");
        s.pop();
        s.add("a");
        s.shut_down();
        assert!(s.done(&"a"));
        assert_eq!(s.pop(), Some("a"));
    }

    struct PanickyMetrics;

    impl QueueMetrics<&'static str> for PanickyMetrics {
        fn add(&mut self, _key: &&'static str) {
            panic!("add hook");
        }
        fn get(&mut self, _key: &&'static str) {
            panic!("get hook");
        }
        fn done(&mut self, _key: &&'static str) {
            panic!("done hook");
        }
        fn update_unfinished_work(&mut self) {
            panic!("tick hook");
        }
    }

    #[test]
    fn panicking_hooks_leave_state_consistent() {
        let mut s = State::new(Box::new(PanickyMetrics));

        assert!(s.add("a"));
        assert_eq!(queued(&s), ["a"]);

        assert_eq!(s.pop(), Some("a"));
        assert!(s.processing.contains("a"));
        assert!(!s.dirty.contains("a"));

        assert!(!s.add("a"));
        assert!(s.done(&"a"));
        assert_eq!(queued(&s), ["a"]);
        assert_invariants(&s);

        s.update_unfinished_work();
        assert_eq!(s.pop(), Some("a"));
        assert!(!s.done(&"a"));
        assert!(s.is_idle());
    }

    #[test]
    fn metrics_see_each_transition_once() {
        let recorder = Recorder::default();
        let mut s = State::new(Box::new(recorder.clone()));

        s.add("a");
        s.add("a");
        s.pop();
        s.add("a");
        s.done(&"a");
        s.update_unfinished_work();

        let events = recorder.0.lock().clone();
        assert_eq!(events, ["add a", "get a", "add a", "done a", "tick"]);
    }
}
