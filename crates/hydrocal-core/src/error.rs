//! Error types shared across the workspace

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems, surfaced before any engine invocation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no calibration parameters defined")]
    NoParameters,

    #[error("no observation channels defined")]
    NoChannels,

    #[error("parameter '{name}': lower bound {lower} exceeds upper bound {upper}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("parameter ranks must form a dense permutation of 0..{expected}, got rank {rank} for '{name}'")]
    InvalidRank {
        name: String,
        rank: usize,
        expected: usize,
    },

    #[error("duplicate parameter rank {rank} ('{first}' and '{second}')")]
    DuplicateRank {
        rank: usize,
        first: String,
        second: String,
    },

    #[error("duplicate parameter name '{name}'")]
    DuplicateParameter { name: String },

    #[error("duplicate channel name '{name}'")]
    DuplicateChannel { name: String },

    #[error("unknown channel '{name}' referenced by the {subset} set")]
    UnknownChannel { name: String, subset: String },

    #[error(
        "channel '{channel}' mixes sign conventions: {metric} with weight {weight} \
         is inconsistent with direction '{direction}'"
    )]
    MixedConvention {
        channel: String,
        metric: String,
        weight: f64,
        direction: String,
    },

    #[error("parameter set does not match the parameter space: {reason}")]
    ParameterMismatch { reason: String },

    #[error("event '{name}': start {start} is not before end {end}")]
    InvalidEventWindow {
        name: String,
        start: String,
        end: String,
    },

    #[error("reporting step must be positive")]
    InvalidReportingStep,
}

/// Problems constructing or transforming time series.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("timestamps and values differ in length ({stamps} vs {values})")]
    MismatchedLengths { stamps: usize, values: usize },

    #[error("timestamps must be strictly increasing (violation at index {index})")]
    NonMonotonic { index: usize },

    #[error("channel '{channel}' has no sensor data file configured")]
    MissingDataFile { channel: String },

    #[error("no observation series loaded for channel '{channel}'")]
    MissingSeries { channel: String },

    #[error("failed to read sensor file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unparseable record in {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Failures of the external simulation engine. Recovered into penalty
/// fitness by the calibration layer; never abort the search.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("engine exited with status {code:?}")]
    Exit { code: Option<i32> },

    #[error("engine produced no output file at {path}")]
    MissingOutput { path: PathBuf },

    #[error("engine output is missing node '{node}'")]
    MissingNode { node: String },

    #[error("engine output is malformed: {message}")]
    MalformedOutput { message: String },

    #[error("input template: {message}")]
    Template { message: String },

    #[error(transparent)]
    Series(#[from] SeriesError),
}
