//! The simulation engine boundary
//!
//! The engine is a black box: deterministic given its inputs, slow, and
//! allowed to fail. Everything the calibration layer knows about it is this
//! trait.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::timeseries::TimeSeries;
use crate::types::{Event, ParameterSet};

/// One simulation job: a feasible parameter set, the event to simulate and
/// the nodes whose series the caller wants back.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    /// Calibration parameter values, already bounds-checked by the caller
    pub parameters: ParameterSet,

    /// Time window and initial conditions
    pub event: Event,

    /// Reporting resolution of the simulated series, in seconds
    pub reporting_step_sec: u32,

    /// Engine node identifiers to extract
    pub nodes: Vec<String>,
}

/// A hydrodynamic network simulator.
///
/// Implementations must be deterministic for identical requests and must not
/// rely on state carried over between invocations beyond the request itself.
pub trait SimulationEngine {
    /// Run one simulation synchronously and return the requested node
    /// series, keyed by node identifier.
    fn simulate(&self, request: &SimulationRequest) -> Result<HashMap<String, TimeSeries>, EngineError>;
}

impl<T: SimulationEngine + ?Sized> SimulationEngine for &T {
    fn simulate(&self, request: &SimulationRequest) -> Result<HashMap<String, TimeSeries>, EngineError> {
        (**self).simulate(request)
    }
}
