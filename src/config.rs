//! Validated worker configuration.

use std::thread;

use crate::algorithms::{AlgoError, Variant};
use crate::lanes::Lanes;
use crate::scanner::ScanMode;

/// Errors raised while validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Algo(#[from] AlgoError),

    #[error("Invalid lane count '{0}' (expected 1, 4, 8 or auto)")]
    InvalidLanes(String),

    #[error("Thread count must be at least 1")]
    NoThreads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub variant: Variant,
    pub lanes: Lanes,
    pub threads: usize,
    pub mode: ScanMode,
}

impl WorkerConfig {
    pub fn new(algo: &str, lanes: &str, threads: Option<usize>, bench: bool) -> Result<Self, ConfigError> {
        let threads = match threads {
            Some(0) => return Err(ConfigError::NoThreads),
            Some(n) => n,
            None => default_threads(),
        };
        Ok(Self {
            variant: algo.parse()?,
            lanes: parse_lanes(lanes)?,
            threads,
            mode: if bench { ScanMode::Bench } else { ScanMode::Live },
        })
    }
}

/// `1`, `4`, `8`, or `auto` for CPU feature detection
pub fn parse_lanes(value: &str) -> Result<Lanes, ConfigError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("auto") {
        return Ok(Lanes::detect());
    }
    value
        .parse::<usize>()
        .ok()
        .and_then(Lanes::from_count)
        .ok_or_else(|| ConfigError::InvalidLanes(value.to_string()))
}

pub fn default_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
