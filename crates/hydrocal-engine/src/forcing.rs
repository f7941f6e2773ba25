//! Forcing-data preparation
//!
//! The engine reads its inflow boundary condition from a headerless
//! space-separated `date time value` file at one-second resolution. The
//! writer produces that file from a raw forcing series once per experiment;
//! the template's `forcing_data_file` slot then points every run at it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use hydrocal_core::{EngineError, TimeSeries};
use tracing::debug;

/// Resample the forcing series to one second, clip it to the simulation
/// window and write it in the engine's `date time value` format.
pub fn write_forcing_file(
    series: &TimeSeries,
    start: NaiveDateTime,
    end: NaiveDateTime,
    path: &Path,
) -> Result<(), EngineError> {
    let prepared = series.resample_mean(1).clip(start, end);

    let mut writer = BufWriter::new(File::create(path)?);
    for (stamp, value) in prepared.iter() {
        writeln!(
            writer,
            "{} {} {}",
            stamp.format("%m/%d/%Y"),
            stamp.format("%H:%M:%S"),
            value
        )?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = prepared.len(), "wrote forcing data");
    Ok(())
}
