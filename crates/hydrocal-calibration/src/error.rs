//! Error types of the calibration layer

use hydrocal_core::{ConfigError, EngineError, SeriesError};
use thiserror::Error;

/// Failure to write or read the trial log or the result ledger. Fatal: the
/// run cannot guarantee reproducibility without its durable record.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("failed to serialize settings snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("malformed trial log: {message}")]
    MalformedLog { message: String },
}

/// A single model evaluation that produced no usable simulation.
///
/// These are recovered locally: the fitness oracle converts them into the
/// direction's worst-case penalty and the search continues.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("parameter '{name}' = {value} outside configured bounds")]
    OutOfBounds { name: String, value: f64 },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("simulation output is missing channel '{channel}'")]
    MissingChannel { channel: String },
}

impl ModelError {
    /// Bounds violations are expected during stochastic sampling and only
    /// worth a debug line; everything else is a degraded-mode warning.
    pub fn is_bounds_violation(&self) -> bool {
        matches!(self, ModelError::OutOfBounds { .. })
    }
}

/// Top-level error of optimizer and experiment runs.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("solver failed: {0}")]
    Solver(String),
}

impl From<std::io::Error> for CalibrationError {
    fn from(err: std::io::Error) -> Self {
        CalibrationError::Persistence(PersistenceError::Io(err))
    }
}
