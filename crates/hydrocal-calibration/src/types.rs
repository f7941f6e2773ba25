//! Result types of a calibration search

use hydrocal_core::ParameterSet;
use serde::{Deserialize, Serialize};

/// Summary of one finished search.
///
/// The trial-by-trial record lives in the on-disk log; this is the compact
/// answer callers usually want.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Best parameter set found, in named form
    pub best_parameters: ParameterSet,

    /// The same candidate in positional (rank-ordered) form
    pub best_vector: Vec<f64>,

    /// Fitness of the best candidate, in the experiment's sign convention
    pub best_fitness: f64,

    /// Shuffling generations (SCE-UA) or solver iterations (swarm)
    pub generations: usize,

    /// Trials logged, including rejected and failed candidates
    pub evaluations: usize,

    /// Whether the convergence criterion fired before the budget ran out
    pub converged: bool,

    /// Termination reason
    pub termination_reason: String,
}
