//! The append-only trial log
//!
//! The log is the durable record of the whole search: one CSV row per
//! fitness evaluation, flushed before the next evaluation begins so a
//! crashed run leaves a valid prefix. Row position is the trial's run
//! index. Column layout is `like1,par<name>...,chain` with parameters in
//! rank order.

use std::fs::File;
use std::path::{Path, PathBuf};

use hydrocal_core::{Direction, ParameterSet, ParameterSpace};

use crate::error::PersistenceError;

/// One logged evaluation, immutable once written.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    /// Position in the log (0-based, monotonic)
    pub run_index: usize,

    /// The candidate, in named form
    pub parameters: ParameterSet,

    /// Raw fitness, in the experiment's sign convention
    pub fitness: f64,

    /// Complex/chain that produced the candidate (0 for initialization)
    pub chain: u32,
}

/// Append-only writer for the trial log.
pub struct TrialWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: usize,
}

impl TrialWriter {
    /// Create the log with its header. An existing file is truncated: one
    /// log belongs to one search.
    pub fn create(path: &Path, space: &ParameterSpace) -> Result<Self, PersistenceError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(header(space))?;
        writer.flush()?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far; equals the next trial's run index.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append one trial and flush it to disk, returning its run index.
    pub fn append(
        &mut self,
        vector: &[f64],
        fitness: f64,
        chain: u32,
    ) -> Result<usize, PersistenceError> {
        let mut record = Vec::with_capacity(vector.len() + 2);
        record.push(fitness.to_string());
        record.extend(vector.iter().map(|v| v.to_string()));
        record.push(chain.to_string());
        self.writer.write_record(&record)?;
        self.writer.flush()?;

        let run_index = self.rows;
        self.rows += 1;
        Ok(run_index)
    }
}

fn header(space: &ParameterSpace) -> Vec<String> {
    let mut fields = Vec::with_capacity(space.len() + 2);
    fields.push("like1".to_string());
    fields.extend(space.names().iter().map(|name| format!("par{name}")));
    fields.push("chain".to_string());
    fields
}

/// Read the full trial log back, in run order.
pub fn read_trials(
    path: &Path,
    space: &ParameterSpace,
) -> Result<Vec<TrialRecord>, PersistenceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let expected = header(space);
    let found: Vec<String> = reader
        .headers()?
        .iter()
        .map(|f| f.to_string())
        .collect();
    if found != expected {
        return Err(PersistenceError::MalformedLog {
            message: format!(
                "header {:?} does not match the parameter space ({:?})",
                found, expected
            ),
        });
    }

    let mut trials = Vec::new();
    for (run_index, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != expected.len() {
            return Err(PersistenceError::MalformedLog {
                message: format!("row {run_index} has {} fields", record.len()),
            });
        }
        let fitness = parse_field(&record[0], run_index)?;
        let mut vector = Vec::with_capacity(space.len());
        for field in record.iter().take(space.len() + 1).skip(1) {
            vector.push(parse_field(field, run_index)?);
        }
        let chain = record[space.len() + 1]
            .parse::<u32>()
            .map_err(|_| PersistenceError::MalformedLog {
                message: format!("row {run_index}: bad chain id '{}'", &record[space.len() + 1]),
            })?;
        let parameters = space
            .to_named(&vector)
            .map_err(|e| PersistenceError::MalformedLog {
                message: e.to_string(),
            })?;
        trials.push(TrialRecord {
            run_index,
            parameters,
            fitness,
            chain,
        });
    }
    Ok(trials)
}

fn parse_field(field: &str, run_index: usize) -> Result<f64, PersistenceError> {
    field.parse::<f64>().map_err(|_| PersistenceError::MalformedLog {
        message: format!("row {run_index}: bad float '{field}'"),
    })
}

/// The best `how_many` trials of a finished (or interrupted) search,
/// best-first. Ties on fitness break toward the lower run index.
pub fn best_trials(
    path: &Path,
    space: &ParameterSpace,
    direction: Direction,
    how_many: usize,
) -> Result<Vec<TrialRecord>, PersistenceError> {
    let mut trials = read_trials(path, space)?;
    trials.sort_by(|a, b| {
        direction
            .compare(a.fitness, b.fitness)
            .then(a.run_index.cmp(&b.run_index))
    });
    trials.truncate(how_many);
    Ok(trials)
}
