//! Runs a full calibration experiment with defined settings
//!
//! One calibration event drives the search; the chosen parameter sets are
//! then re-simulated against every validation event and scored with the
//! validation channel subset. Every scoring outcome lands in the result
//! ledger with enough metadata to trace it back to its search trial.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use hydrocal_core::{
    Event, ExperimentSettings, ObservationSet, ParameterSet, ParameterSpace, SimulationEngine,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::error::{CalibrationError, PersistenceError};
use crate::ledger::{EventKind, ResultLedger, ResultRow};
use crate::model::SimulationModel;
use crate::objective::ObjectiveFunction;
use crate::optimization::{OptimizationConfig, Optimizer};
use crate::problem::CalibrationProblem;
use crate::trial_log::TrialRecord;
use crate::types::CalibrationResult;

/// File name of the trial log inside the experiment directory.
const TRIAL_LOG_FILE: &str = "iterations.csv";

/// File name of the configuration snapshot inside the experiment directory.
const SETTINGS_FILE: &str = "settings.json";

/// Everything a finished experiment hands back in memory. The durable
/// record is the trial log plus the ledger rows.
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    /// Summary of the search on the calibration event
    pub calibration: CalibrationResult,

    /// The best trials that were re-scored on the validation events
    pub best: Vec<TrialRecord>,

    /// Ledger rows written by this run
    pub rows_written: usize,
}

/// Run full calibration experiment with defined settings
pub struct ExperimentRunner<E> {
    dir: PathBuf,
    output_file: PathBuf,
    settings: ExperimentSettings,
    metadata: BTreeMap<String, String>,
    engine: E,
    observations: ObservationSet,
}

impl<E: SimulationEngine> ExperimentRunner<E> {
    /// Validate the settings, create the experiment directory and persist
    /// the configuration snapshot. Fails before any engine invocation.
    pub fn new(
        data_directory: &Path,
        output_file: &Path,
        settings: ExperimentSettings,
        metadata: BTreeMap<String, String>,
        engine: E,
        observations: ObservationSet,
    ) -> Result<Self, CalibrationError> {
        settings.validate()?;

        if !data_directory.exists() {
            info!(directory = %data_directory.display(), "creating experiment directory");
            fs::create_dir_all(data_directory)?;
        }

        let snapshot =
            serde_json::to_string_pretty(&settings).map_err(PersistenceError::Snapshot)?;
        fs::write(data_directory.join(SETTINGS_FILE), snapshot)?;

        Ok(Self {
            dir: data_directory.to_path_buf(),
            output_file: output_file.to_path_buf(),
            settings,
            metadata,
            engine,
            observations,
        })
    }

    pub fn settings(&self) -> &ExperimentSettings {
        &self.settings
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Calibrate against the calibration event, then score the best
    /// `keep_best` trials on every validation event.
    pub fn run(
        &self,
        config: OptimizationConfig,
        keep_best: usize,
    ) -> Result<ExperimentOutcome, CalibrationError> {
        let space = self.settings.space()?;
        let step = self.settings.reporting_step_sec;

        let model = SimulationModel::new(
            &self.engine,
            space.clone(),
            self.settings.channels.clone(),
            step,
        );
        let objective =
            ObjectiveFunction::new(self.settings.calibration_set(), self.settings.direction)?;
        let observed = self.observations.for_event(
            &self.settings.calibration_channels,
            &self.settings.calibration_event,
            step,
        )?;
        let problem = CalibrationProblem::new(
            model,
            objective,
            observed,
            self.settings.calibration_event.clone(),
            &self.dir.join(TRIAL_LOG_FILE),
        )?;

        let optimizer = Optimizer::new(problem, config);
        let calibration = optimizer.run()?;
        info!(
            fitness = calibration.best_fitness,
            evaluations = calibration.evaluations,
            converged = calibration.converged,
            "calibration finished"
        );

        let best = optimizer.best(keep_best)?;
        let ledger = ResultLedger::new(&self.output_file, &space, self.metadata.clone());

        let mut rows_written = 0;
        for trial in &best {
            let vector = space.to_vector(&trial.parameters)?;
            for (kind, event) in self.scoring_events() {
                let fitness = self.score(&space, &trial.parameters, event)?;
                ledger.append(&ResultRow {
                    kind,
                    event: event.name.clone(),
                    vector: vector.clone(),
                    fitness,
                    run_index: trial.run_index,
                    calibration_fitness: Some(trial.fitness),
                    time: Utc::now(),
                })?;
                rows_written += 1;
            }
        }

        Ok(ExperimentOutcome {
            calibration,
            best,
            rows_written,
        })
    }

    /// Baseline: draw `count` parameter sets uniformly from the bounds (no
    /// guided search), score each on the validation events and ledger the
    /// outcomes as `uncalibrated`.
    pub fn evaluate_uncalibrated(
        &self,
        count: usize,
        seed: Option<u64>,
    ) -> Result<Vec<f64>, CalibrationError> {
        let space = self.settings.space()?;
        let bounds = space.bounds();
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let ledger = ResultLedger::new(&self.output_file, &space, self.metadata.clone());
        let mut fitnesses = Vec::with_capacity(count);
        for sample_index in 0..count {
            let vector: Vec<f64> = bounds
                .iter()
                .map(|(lower, upper)| rng.gen_range(*lower..=*upper))
                .collect();
            let parameters = space.to_named(&vector)?;
            for (_, event) in self.scoring_events() {
                let fitness = self.score(&space, &parameters, event)?;
                ledger.append(&ResultRow {
                    kind: EventKind::Uncalibrated,
                    event: event.name.clone(),
                    vector: vector.clone(),
                    fitness,
                    run_index: sample_index,
                    calibration_fitness: None,
                    time: Utc::now(),
                })?;
                fitnesses.push(fitness);
            }
        }
        Ok(fitnesses)
    }

    /// The events each chosen parameter set is scored on: all validation
    /// events, plus the calibration event itself when configured.
    fn scoring_events(&self) -> impl Iterator<Item = (EventKind, &Event)> {
        let calibration = self
            .settings
            .revalidate_calibration_event
            .then_some((EventKind::Calibration, &self.settings.calibration_event));
        calibration.into_iter().chain(
            self.settings
                .validation_events
                .iter()
                .map(|event| (EventKind::Validation, event)),
        )
    }

    /// Score one parameter set on one event with the validation channel
    /// subset. Engine failures degrade to penalty fitness, like during the
    /// search.
    fn score(
        &self,
        space: &ParameterSpace,
        parameters: &ParameterSet,
        event: &Event,
    ) -> Result<f64, CalibrationError> {
        let step = self.settings.reporting_step_sec;
        let model = SimulationModel::new(
            &self.engine,
            space.clone(),
            self.settings.channels.clone(),
            step,
        );
        let objective =
            ObjectiveFunction::new(self.settings.validation_set(), self.settings.direction)?;
        let observed =
            self.observations
                .for_event(&self.settings.validation_channels, event, step)?;

        let scored = model
            .run(parameters, event, &self.settings.validation_channels)
            .and_then(|simulated| objective.evaluate(&simulated, &observed));
        match scored {
            Ok(fitness) => Ok(fitness),
            Err(err) => {
                warn!(%err, event = %event.name, "validation run failed; penalty fitness");
                Ok(self.settings.direction.worst())
            }
        }
    }
}
