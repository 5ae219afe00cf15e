//! Integration tests for the worker pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dedupq::DedupQueue;
use dedupq::worker::{WorkerPool, WorkerStats};
use parking_lot::Mutex;

#[test]
fn pool_processes_every_key_and_exits_on_shutdown() {
    let q: DedupQueue<u32> = DedupQueue::new();
    let seen = Arc::new(Mutex::new(HashMap::<u32, u32>::new()));

    let pool = {
        let seen = Arc::clone(&seen);
        WorkerPool::spawn(&q, 3, move |key: &u32| {
            *seen.lock().entry(*key).or_default() += 1;
            Ok::<(), String>(())
        })
        .unwrap()
    };
    assert_eq!(pool.len(), 3);

    for key in 0..50 {
        q.add(key);
    }
    q.shut_down_with_drain();

    let stats = pool.join().unwrap();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.panicked, 0);
    assert!(stats.processed >= 50);

    let seen = seen.lock();
    assert_eq!(seen.len(), 50);
}

#[test]
fn failing_and_panicking_handlers_still_release_the_key() {
    let q: DedupQueue<&'static str> = DedupQueue::new();
    let pool = WorkerPool::spawn(&q, 1, |key: &&'static str| match *key {
        "bad" => Err("boom"),
        "worse" => panic!("handler exploded"),
        _ => Ok(()),
    })
    .unwrap();

    q.add("bad");
    q.add("worse");
    q.add("good");
    q.shut_down_with_drain();

    let stats = pool.join().unwrap();
    assert_eq!(
        stats,
        WorkerStats {
            processed: 1,
            failed: 1,
            panicked: 1,
        }
    );
    assert!(q.is_empty());
}

#[test]
fn handler_can_requeue_its_own_key() {
    let q: DedupQueue<&'static str> = DedupQueue::new();
    let attempts = Arc::new(Mutex::new(0u32));

    let pool = {
        let q2 = q.clone();
        let attempts = Arc::clone(&attempts);
        WorkerPool::spawn(&q, 2, move |key: &&'static str| {
            let mut n = attempts.lock();
            *n += 1;
            if *n < 3 {
                // Re-added while in flight, so it comes back after done.
                q2.add(*key);
                return Err(format!("attempt {n} failed"));
            }
            Ok(())
        })
        .unwrap()
    };

    q.add("flaky");
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while *attempts.lock() < 3 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    q.shut_down_with_drain();

    let stats = pool.join().unwrap();
    assert_eq!(*attempts.lock(), 3);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.processed, 1);
}

#[test]
fn zero_workers_is_rejected() {
    let q: DedupQueue<u32> = DedupQueue::new();
    let result = WorkerPool::spawn(&q, 0, |_: &u32| Ok::<(), String>(()));
    assert!(result.is_err());
}
