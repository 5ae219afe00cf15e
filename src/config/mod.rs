//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Per-queue
//! options live in [`crate::queue::QueueConfig`]; this covers the process
//! around it (telemetry, worker count, reporter period).

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default number of consumer threads.
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub workers: usize,
    pub unfinished_work_update_period: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let workers = parsed_var("DEDUPQ_WORKERS")?.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(Error::Config("DEDUPQ_WORKERS must be at least 1".to_string()));
        }

        let period_ms: u64 = parsed_var("DEDUPQ_UPDATE_PERIOD_MS")?
            .unwrap_or(crate::queue::DEFAULT_UNFINISHED_WORK_UPDATE_PERIOD.as_millis() as u64);
        if period_ms == 0 {
            return Err(Error::Config(
                "DEDUPQ_UPDATE_PERIOD_MS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            workers,
            unfinished_work_update_period: Duration::from_millis(period_ms),
        })
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {raw:?} ({e})"))),
        Err(_) => Ok(None),
    }
}
