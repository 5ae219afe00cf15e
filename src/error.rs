//! Error types for dedupq.
//!
//! The queue itself never fails; these cover the surrounding pieces
//! (configuration, telemetry setup, the worker pool).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
