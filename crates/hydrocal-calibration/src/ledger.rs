//! The experiment result ledger
//!
//! One row per (parameter set × event), appended across experiment runs and
//! never rewritten. The first write creates the file with its header;
//! every later write appends rows only, so the ledger grows into the
//! cross-experiment comparison table.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hydrocal_core::ParameterSpace;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// What produced a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Scored on the event the search was tuned against
    #[serde(rename = "calibration")]
    Calibration,

    /// Scored on an independent held-out event
    #[serde(rename = "validation")]
    Validation,

    /// Uniformly sampled baseline, no search involved
    #[serde(rename = "uncalibrated")]
    Uncalibrated,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Calibration => "calibration",
            EventKind::Validation => "validation",
            EventKind::Uncalibrated => "uncalibrated",
        };
        f.write_str(name)
    }
}

/// One persisted scoring outcome.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub kind: EventKind,

    /// Name of the scored event
    pub event: String,

    /// Parameter values in rank order
    pub vector: Vec<f64>,

    /// Fitness on the scored event (`error` column)
    pub fitness: f64,

    /// Run index of the originating search trial, or the sample index for
    /// uncalibrated baselines (`run_count` column)
    pub run_index: usize,

    /// The trial's fitness on the calibration event (`cal_err` column);
    /// empty for uncalibrated rows
    pub calibration_fitness: Option<f64>,

    /// Wall-clock time the row was produced
    pub time: DateTime<Utc>,
}

/// Append-only writer for the result ledger.
pub struct ResultLedger {
    path: PathBuf,
    parameter_names: Vec<String>,
    metadata: BTreeMap<String, String>,
}

impl ResultLedger {
    /// Bind a ledger to a path. Metadata key/value pairs are appended to
    /// every row; keys become header columns (in sorted order).
    pub fn new(path: &Path, space: &ParameterSpace, metadata: BTreeMap<String, String>) -> Self {
        Self {
            path: path.to_path_buf(),
            parameter_names: space.names(),
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn header(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .parameter_names
            .iter()
            .map(|name| format!("par{name}"))
            .collect();
        fields.extend(
            ["error", "run_count", "cal_err", "type", "time", "event"]
                .iter()
                .map(|s| s.to_string()),
        );
        fields.extend(self.metadata.keys().cloned());
        fields
    }

    /// Append one row, creating the file with its header first if needed.
    pub fn append(&self, row: &ResultRow) -> Result<(), PersistenceError> {
        let fresh = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if fresh {
            writer.write_record(self.header())?;
        }

        let mut record: Vec<String> = row.vector.iter().map(|v| v.to_string()).collect();
        record.push(row.fitness.to_string());
        record.push(row.run_index.to_string());
        record.push(
            row.calibration_fitness
                .map(|f| f.to_string())
                .unwrap_or_default(),
        );
        record.push(row.kind.to_string());
        record.push(row.time.to_rfc3339());
        record.push(row.event.clone());
        record.extend(self.metadata.values().cloned());

        writer.write_record(&record)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hydrocal_core::ParameterDefinition;

    use super::*;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterDefinition::new("s_r", 0, 0.0, 1.0),
            ParameterDefinition::new("c_w1", 1, 0.0, 10.0),
        ])
        .unwrap()
    }

    fn row(kind: EventKind, fitness: f64) -> ResultRow {
        ResultRow {
            kind,
            event: "Exp 20".to_string(),
            vector: vec![0.01, 2.0],
            fitness,
            run_index: 42,
            calibration_fitness: Some(0.5),
            time: Utc::now(),
        }
    }

    #[test]
    fn fresh_ledger_gets_one_header_and_keeps_row_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiments.csv");
        let mut metadata = BTreeMap::new();
        metadata.insert("count_sensors".to_string(), "3".to_string());

        let ledger = ResultLedger::new(&path, &space(), metadata);
        ledger.append(&row(EventKind::Validation, 0.7)).unwrap();
        ledger.append(&row(EventKind::Validation, 0.9)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "pars_r,parc_w1,error,run_count,cal_err,type,time,event,count_sensors"
        );
        assert!(lines[1].starts_with("0.01,2,0.7,42,0.5,validation,"));
        assert!(lines[2].starts_with("0.01,2,0.9,42,0.5,validation,"));
    }

    #[test]
    fn existing_ledger_is_appended_without_a_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiments.csv");

        let ledger = ResultLedger::new(&path, &space(), BTreeMap::new());
        ledger.append(&row(EventKind::Calibration, 0.1)).unwrap();

        // a later experiment run opens the same ledger
        let ledger = ResultLedger::new(&path, &space(), BTreeMap::new());
        let mut uncalibrated = row(EventKind::Uncalibrated, 1.3);
        uncalibrated.calibration_fitness = None;
        ledger.append(&uncalibrated).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.iter().filter(|l| l.starts_with("pars_r")).count(), 1);
        assert!(lines[2].contains(",uncalibrated,"));
        // empty cal_err field for the baseline row
        assert!(lines[2].contains(",1.3,42,,uncalibrated,"));
    }
}
