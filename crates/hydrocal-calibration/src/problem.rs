//! The logged fitness oracle the samplers evaluate against

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use argmin::core::CostFunction;
use hydrocal_core::{
    Direction, Event, ParameterSpace, SimulationEngine, TimeSeries,
};
use tracing::warn;

use crate::error::CalibrationError;
use crate::model::SimulationModel;
use crate::objective::ObjectiveFunction;
use crate::trial_log::TrialWriter;

/// Chain id logged for trials that no evolution complex produced: the
/// initial population and every particle-swarm evaluation.
pub const UNCHAINED: u32 = 0;

/// One calibration problem: model, scoring and the trial log, bound to the
/// calibration event.
///
/// Every fitness evaluation (feasible, infeasible or failed) is appended
/// to the log and flushed before the value is returned, so the on-disk
/// record is always a valid prefix of the search. Evaluation-time failures
/// are absorbed into the direction's worst-case penalty; the search only
/// ever sees them as poor fitness.
pub struct CalibrationProblem<E> {
    model: SimulationModel<E>,
    objective: ObjectiveFunction,
    observed: HashMap<String, TimeSeries>,
    event: Event,
    channel_names: Vec<String>,
    log: RefCell<TrialWriter>,
    failures: Cell<usize>,
}

impl<E: SimulationEngine> CalibrationProblem<E> {
    /// Create the problem and its trial log at `log_path`.
    pub fn new(
        model: SimulationModel<E>,
        objective: ObjectiveFunction,
        observed: HashMap<String, TimeSeries>,
        event: Event,
        log_path: &Path,
    ) -> Result<Self, CalibrationError> {
        let log = TrialWriter::create(log_path, model.space())?;
        let channel_names = objective
            .channels()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        Ok(Self {
            model,
            objective,
            observed,
            event,
            channel_names,
            log: RefCell::new(log),
            failures: Cell::new(0),
        })
    }

    pub fn space(&self) -> &ParameterSpace {
        self.model.space()
    }

    pub fn direction(&self) -> Direction {
        self.objective.direction()
    }

    pub fn log_path(&self) -> PathBuf {
        self.log.borrow().path().to_path_buf()
    }

    /// Trials logged so far (also the next run index).
    pub fn evaluations(&self) -> usize {
        self.log.borrow().rows()
    }

    /// Engine/scoring failures absorbed into penalty fitness, for post-run
    /// diagnosis.
    pub fn failures(&self) -> usize {
        self.failures.get()
    }

    /// Evaluate one positional candidate, append it to the trial log and
    /// return its raw fitness.
    ///
    /// Only persistence problems surface as errors; they abort the run.
    pub fn evaluate_vector(&self, vector: &[f64], chain: u32) -> Result<f64, CalibrationError> {
        let fitness = self.fitness_of(vector);
        self.log.borrow_mut().append(vector, fitness, chain)?;
        Ok(fitness)
    }

    fn fitness_of(&self, vector: &[f64]) -> f64 {
        let worst = self.direction().worst();
        let parameters = match self.space().to_named(vector) {
            Ok(parameters) => parameters,
            Err(err) => {
                warn!(%err, "candidate does not match the parameter space");
                return worst;
            }
        };
        let scored = self
            .model
            .run(&parameters, &self.event, &self.channel_names)
            .and_then(|simulated| self.objective.evaluate(&simulated, &self.observed));
        match scored {
            Ok(fitness) => fitness,
            Err(err) if err.is_bounds_violation() => worst,
            Err(err) => {
                self.failures.set(self.failures.get() + 1);
                warn!(%err, "evaluation failed; continuing with penalty fitness");
                worst
            }
        }
    }
}

/// The swarm solver minimizes; raw fitness is mapped through the
/// experiment's direction on the way out and logged unmapped.
impl<E: SimulationEngine> CostFunction for &CalibrationProblem<E> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let fitness = self.evaluate_vector(param, UNCHAINED)?;
        Ok(self.direction().as_cost(fitness))
    }
}
