//! # dedupq
//!
//! A deduplicating, FIFO, blocking work queue for handing keys from event
//! producers to a pool of concurrent consumers.
//!
//! A key is held by at most one consumer at a time. Re-adding a key while it
//! is being processed marks it for another round instead of dropping the
//! update, and shutdown lets queued work drain before consumers are told to
//! stop.
//!
//! ```no_run
//! use dedupq::DedupQueue;
//!
//! let queue = DedupQueue::new();
//! queue.add("pods/default/web-0".to_string());
//!
//! let worker = queue.clone();
//! let handle = std::thread::spawn(move || {
//!     while let Some(key) = worker.get() {
//!         println!("syncing {key}");
//!         worker.done(&key);
//!     }
//! });
//!
//! queue.shut_down();
//! handle.join().unwrap();
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod telemetry;
pub mod worker;

pub use queue::{DedupQueue, QueueConfig};
