//! The external engine process
//!
//! One simulation is: render the input template into a checked-out working
//! directory, run the executable synchronously with the conventional
//! `<input> <report> <output>` argument triple, then extract the node series
//! from the output file. Any non-zero exit or unusable output surfaces as an
//! [`EngineError`] for the calibration layer to absorb.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use hydrocal_core::{EngineError, SimulationEngine, SimulationRequest, TimeSeries};
use tracing::debug;

use crate::output::read_output_file;
use crate::slots::SlotPool;
use crate::template::InputTemplate;

/// File names inside a working-directory slot.
const INPUT_FILE: &str = "model.inp";
const REPORT_FILE: &str = "report.rpt";
const OUTPUT_FILE: &str = "output.csv";

/// Template slots filled from the simulation window, alongside the
/// per-parameter and initial-condition slots.
const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%H:%M:%S";

/// A hydrodynamic simulator living in an external executable.
pub struct ExternalEngine {
    executable: PathBuf,
    template: InputTemplate,
    forcing_data_file: PathBuf,
    slots: SlotPool,
}

impl ExternalEngine {
    /// Bind the engine to its executable, input template, forcing-data file
    /// and working-directory pool.
    pub fn new(
        executable: impl Into<PathBuf>,
        template: InputTemplate,
        forcing_data_file: impl Into<PathBuf>,
        slots: SlotPool,
    ) -> Self {
        Self {
            executable: executable.into(),
            template,
            forcing_data_file: forcing_data_file.into(),
            slots,
        }
    }

    /// Every substitution value for one request: calibration parameters,
    /// the event's initial conditions, the simulation window and the
    /// forcing-data reference.
    fn template_vars(&self, request: &SimulationRequest) -> BTreeMap<String, String> {
        let event = &request.event;
        let mut vars = BTreeMap::new();
        for (name, value) in &request.parameters {
            vars.insert(name.clone(), value.to_string());
        }
        for (slot, value) in &event.initial_conditions {
            vars.insert(slot.clone(), value.to_string());
        }
        vars.insert(
            "sim_start_date".to_string(),
            event.start.format(DATE_FORMAT).to_string(),
        );
        vars.insert(
            "sim_start_time".to_string(),
            event.start.format(TIME_FORMAT).to_string(),
        );
        vars.insert(
            "sim_end_date".to_string(),
            event.end.format(DATE_FORMAT).to_string(),
        );
        vars.insert(
            "sim_end_time".to_string(),
            event.end.format(TIME_FORMAT).to_string(),
        );
        vars.insert(
            "sim_report_step".to_string(),
            format_report_step(request.reporting_step_sec),
        );
        vars.insert(
            "forcing_data_file".to_string(),
            self.forcing_data_file.display().to_string(),
        );
        vars
    }

    fn invoke(&self, dir: &Path) -> Result<(), EngineError> {
        let status = Command::new(&self.executable)
            .arg(dir.join(INPUT_FILE))
            .arg(dir.join(REPORT_FILE))
            .arg(dir.join(OUTPUT_FILE))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if !status.success() {
            return Err(EngineError::Exit {
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// `H:MM:SS` rendering of the reporting step.
fn format_report_step(step_sec: u32) -> String {
    format!(
        "{}:{:02}:{:02}",
        step_sec / 3600,
        (step_sec % 3600) / 60,
        step_sec % 60
    )
}

impl SimulationEngine for ExternalEngine {
    fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<HashMap<String, TimeSeries>, EngineError> {
        let rendered = self.template.render(&self.template_vars(request))?;

        let slot = self.slots.checkout()?;
        let dir = slot.dir();
        fs::write(dir.join(INPUT_FILE), rendered)?;

        debug!(
            slot = slot.index(),
            event = %request.event.name,
            "invoking engine"
        );
        self.invoke(dir)?;

        let mut node_series = read_output_file(&dir.join(OUTPUT_FILE))?;
        let mut requested = HashMap::with_capacity(request.nodes.len());
        for node in &request.nodes {
            let series = node_series
                .remove(node)
                .ok_or_else(|| EngineError::MissingNode { node: node.clone() })?;
            requested.insert(node.clone(), series);
        }
        Ok(requested)
    }
}
