//! Core types for calibrating hydrodynamic sewer-network models.
//!
//! This crate defines the domain vocabulary shared by the calibration loop
//! and the engine collaborator: bounded [`ParameterSpace`]s with a stable
//! rank order, observation [`Channel`]s with their scoring configuration,
//! strictly-ordered [`TimeSeries`] with an inner-join alignment primitive,
//! the [`SimulationEngine`] boundary trait, and the immutable
//! [`ExperimentSettings`] value validated once at experiment start.

pub mod engine;
pub mod error;
pub mod settings;
pub mod timeseries;
pub mod types;

pub use engine::{SimulationEngine, SimulationRequest};
pub use error::{ConfigError, EngineError, SeriesError};
pub use settings::{check_convention, Direction, ExperimentSettings};
pub use timeseries::{read_sensor_file, ObservationSet, TimeSeries};
pub use types::{
    Channel, Event, MetricKind, Orientation, ParameterDefinition, ParameterSet, ParameterSpace,
};
