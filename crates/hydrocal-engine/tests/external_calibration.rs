//! Calibration loop driven through a real external process
//!
//! The engine executable is a shell script that copies its rendered input
//! file to its output file, so the input template doubles as the simulated
//! result and the substituted `amp` parameter comes straight back as the
//! node's value. Observed flow is constant 1.0, making amp = 1 the optimum.

#![cfg(unix)]

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use hydrocal_calibration::{
    read_trials, CalibrationProblem, ObjectiveFunction, OptimizationConfig, Optimizer, SceUaConfig,
    SimulationModel,
};
use hydrocal_core::{
    Channel, Direction, Event, MetricKind, ObservationSet, ParameterDefinition, ParameterSpace,
    TimeSeries,
};
use hydrocal_engine::{ExternalEngine, InputTemplate, SlotPool};

const STEP_SEC: u32 = 5;
const SAMPLES: usize = 12;

fn origin() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2016, 10, 6)
        .unwrap()
        .and_hms_opt(14, 0, 0)
        .unwrap()
}

fn copying_engine(dir: &Path) -> ExternalEngine {
    let script = dir.join("engine.sh");
    fs::write(&script, "#!/bin/sh\ncat \"$1\" > \"$3\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    // one output row per reporting step, all carrying the amp slot
    let mut template = String::from("datetime;node;value\n");
    for i in 0..SAMPLES {
        let stamp = origin() + Duration::seconds(i as i64 * STEP_SEC as i64);
        template.push_str(&format!("{};s6;$amp\n", stamp.format("%Y-%m-%d %H:%M:%S")));
    }

    ExternalEngine::new(
        script,
        InputTemplate::new(template),
        dir.join("forcing_data.txt"),
        SlotPool::new(&dir.join("model_runs"), 3),
    )
}

#[test]
fn optimizer_recovers_the_scale_through_the_process_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let engine = copying_engine(dir.path());

    let space = ParameterSpace::new(vec![ParameterDefinition::new("amp", 0, 0.0, 2.0)]).unwrap();
    let channel = Channel::new("s6_sensor", "s6", MetricKind::Rmse, 1.0);
    let event = Event::new(
        "Exp 21",
        origin(),
        origin() + Duration::seconds((SAMPLES as i64 - 1) * STEP_SEC as i64),
    );

    let mut observed_series = HashMap::new();
    observed_series.insert(
        "s6_sensor".to_string(),
        TimeSeries::new(
            (0..SAMPLES)
                .map(|i| origin() + Duration::seconds(i as i64 * STEP_SEC as i64))
                .collect(),
            vec![1.0; SAMPLES],
        )
        .unwrap(),
    );
    let observed = ObservationSet::from_series(observed_series)
        .for_event(&["s6_sensor".to_string()], &event, STEP_SEC)
        .unwrap();

    let model = SimulationModel::new(engine, space.clone(), vec![channel.clone()], STEP_SEC);
    let objective = ObjectiveFunction::new(vec![channel], Direction::Minimize).unwrap();
    let problem = CalibrationProblem::new(
        model,
        objective,
        observed,
        event,
        &dir.path().join("iterations.csv"),
    )
    .unwrap();

    let config = OptimizationConfig::SceUa(
        SceUaConfig::new()
            .with_max_evaluations(40)
            .with_num_complexes(2)
            .with_stop_after_stalled_generations(4)
            .with_convergence_fraction(1e-9)
            .with_seed(21),
    );
    let optimizer = Optimizer::new(problem, config);
    let result = optimizer.run().unwrap();

    // observed flow is constant 1.0; the echoed amp must land near it
    assert!(
        (result.best_parameters["amp"] - 1.0).abs() < 0.1,
        "amp = {}",
        result.best_parameters["amp"]
    );
    assert!(result.best_fitness < 0.1);

    let trials = read_trials(&optimizer.problem().log_path(), &space).unwrap();
    assert!(trials.len() >= 40);
    assert_eq!(trials.len(), result.evaluations);
}
