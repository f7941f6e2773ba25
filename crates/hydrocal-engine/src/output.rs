//! Engine result-file extraction
//!
//! The engine reports one delimited file of `datetime;node;value` rows. The
//! reader groups rows by node and hands back ordered series; rows may be
//! interleaved across nodes and need not be sorted.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;
use hydrocal_core::{EngineError, TimeSeries};
use tracing::debug;

/// Datetime formats the engine is known to emit.
const OUTPUT_DT_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Read the engine output file and collect every node's series.
pub fn read_output_file(path: &Path) -> Result<HashMap<String, TimeSeries>, EngineError> {
    if !path.exists() {
        return Err(EngineError::MissingOutput {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)
        .map_err(|err| EngineError::MalformedOutput {
            message: err.to_string(),
        })?;

    let mut by_node: HashMap<String, Vec<(NaiveDateTime, f64)>> = HashMap::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|err| EngineError::MalformedOutput {
            message: format!("row {row}: {err}"),
        })?;
        if record.len() != 3 {
            return Err(EngineError::MalformedOutput {
                message: format!("row {row} has {} fields, expected 3", record.len()),
            });
        }
        let stamp = parse_output_datetime(&record[0]).ok_or_else(|| {
            EngineError::MalformedOutput {
                message: format!("row {row}: bad timestamp '{}'", &record[0]),
            }
        })?;
        let node = record[1].trim().to_string();
        let value: f64 = record[2]
            .trim()
            .parse()
            .map_err(|_| EngineError::MalformedOutput {
                message: format!("row {row}: bad value '{}'", &record[2]),
            })?;
        by_node.entry(node).or_default().push((stamp, value));
    }

    debug!(path = %path.display(), nodes = by_node.len(), "read engine output");
    Ok(by_node
        .into_iter()
        .map(|(node, pairs)| (node, TimeSeries::from_unordered(pairs)))
        .collect())
}

fn parse_output_datetime(field: &str) -> Option<NaiveDateTime> {
    let field = field.trim();
    OUTPUT_DT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(field, format).ok())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_output(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "datetime;node;value").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn groups_interleaved_rows_by_node() {
        let file = write_output(&[
            "2016-10-06 14:00:00;s6;0.1",
            "2016-10-06 14:00:00;s5;1.0",
            "2016-10-06 14:00:05;s6;0.2",
            "2016-10-06 14:00:05;s5;2.0",
        ]);

        let series = read_output_file(file.path()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series["s6"].values(), &[0.1, 0.2]);
        assert_eq!(series["s5"].values(), &[1.0, 2.0]);
    }

    #[test]
    fn unsorted_rows_come_back_in_timestamp_order() {
        let file = write_output(&[
            "2016-10-06 14:00:05;s6;0.2",
            "2016-10-06 14:00:00;s6;0.1",
        ]);

        let series = read_output_file(file.path()).unwrap();
        assert_eq!(series["s6"].values(), &[0.1, 0.2]);
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_output_file(&dir.path().join("output.csv")).unwrap_err();
        assert!(matches!(err, EngineError::MissingOutput { .. }));
    }

    #[test]
    fn malformed_rows_are_rejected() {
        let file = write_output(&["2016-10-06 14:00:00;s6;not_a_number"]);
        let err = read_output_file(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedOutput { .. }));

        let file = write_output(&["yesterday;s6;0.1"]);
        let err = read_output_file(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedOutput { .. }));
    }
}
