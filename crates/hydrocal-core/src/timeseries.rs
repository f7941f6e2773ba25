//! Time series storage, alignment and resampling
//!
//! A [`TimeSeries`] is an ordered sequence of (timestamp, value) pairs with
//! strictly increasing timestamps. Scoring only ever consumes the result of
//! [`TimeSeries::inner_join`], which intersects two series on their common
//! timestamps; an empty intersection is an empty result, not an error.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SeriesError;
use crate::types::{Channel, Event};

/// Datetime formats accepted in sensor files.
const SENSOR_DT_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%d.%m.%Y %H:%M:%S"];

/// An ordered (timestamp, value) sequence with strictly increasing
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    stamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, validating lengths and monotonicity.
    pub fn new(stamps: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self, SeriesError> {
        if stamps.len() != values.len() {
            return Err(SeriesError::MismatchedLengths {
                stamps: stamps.len(),
                values: values.len(),
            });
        }
        for (index, pair) in stamps.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(SeriesError::NonMonotonic { index: index + 1 });
            }
        }
        Ok(Self { stamps, values })
    }

    pub fn empty() -> Self {
        Self {
            stamps: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from possibly unordered pairs; duplicate timestamps are merged
    /// by averaging. Raw sensor dumps are not always sorted.
    pub fn from_unordered(pairs: Vec<(NaiveDateTime, f64)>) -> Self {
        let mut buckets: BTreeMap<NaiveDateTime, (f64, usize)> = BTreeMap::new();
        for (stamp, value) in pairs {
            let entry = buckets.entry(stamp).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        let mut stamps = Vec::with_capacity(buckets.len());
        let mut values = Vec::with_capacity(buckets.len());
        for (stamp, (sum, count)) in buckets {
            stamps.push(stamp);
            values.push(sum / count as f64);
        }
        Self { stamps, values }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn stamps(&self) -> &[NaiveDateTime] {
        &self.stamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.stamps.iter().copied().zip(self.values.iter().copied())
    }

    /// Intersect two series on their common timestamps and return the value
    /// pairs `(self, other)` in timestamp order. No overlap yields an empty
    /// vector.
    pub fn inner_join(&self, other: &TimeSeries) -> Vec<(f64, f64)> {
        let mut pairs = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.stamps.len() && j < other.stamps.len() {
            match self.stamps[i].cmp(&other.stamps[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    pairs.push((self.values[i], other.values[j]));
                    i += 1;
                    j += 1;
                }
            }
        }
        pairs
    }

    /// Restrict the series to `[start, end]` (inclusive).
    pub fn clip(&self, start: NaiveDateTime, end: NaiveDateTime) -> TimeSeries {
        let from = self.stamps.partition_point(|s| *s < start);
        let to = self.stamps.partition_point(|s| *s <= end);
        TimeSeries {
            stamps: self.stamps[from..to].to_vec(),
            values: self.values[from..to].to_vec(),
        }
    }

    /// Multiply all values by a unit-conversion factor.
    pub fn scaled(&self, factor: f64) -> TimeSeries {
        TimeSeries {
            stamps: self.stamps.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    /// Resample onto a fixed grid of `step_sec` seconds, anchored at the
    /// epoch: values falling into the same grid cell are averaged, empty
    /// cells between populated ones are filled by linear interpolation.
    pub fn resample_mean(&self, step_sec: u32) -> TimeSeries {
        if self.is_empty() || step_sec == 0 {
            return self.clone();
        }
        let step = i64::from(step_sec);

        // bucket means, keyed by grid cell start
        let mut buckets: BTreeMap<NaiveDateTime, (f64, usize)> = BTreeMap::new();
        for (stamp, value) in self.iter() {
            let secs = stamp.and_utc().timestamp();
            let offset = secs.rem_euclid(step);
            let cell = stamp - Duration::seconds(offset);
            let entry = buckets.entry(cell).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        let known: Vec<(NaiveDateTime, f64)> = buckets
            .into_iter()
            .map(|(cell, (sum, count))| (cell, sum / count as f64))
            .collect();
        let (first, last) = (known[0].0, known[known.len() - 1].0);

        let mut stamps = Vec::new();
        let mut values = Vec::new();
        let mut upper = 1; // index of the next known point at or past `cell`
        let mut cell = first;
        while cell <= last {
            while upper < known.len() && known[upper].0 < cell {
                upper += 1;
            }
            let value = if upper >= known.len() {
                known[known.len() - 1].1
            } else if known[upper].0 == cell {
                known[upper].1
            } else {
                let (t0, v0) = known[upper - 1];
                let (t1, v1) = known[upper];
                let span = (t1 - t0).num_seconds() as f64;
                let pos = (cell - t0).num_seconds() as f64;
                v0 + (v1 - v0) * pos / span
            };
            stamps.push(cell);
            values.push(value);
            cell += Duration::seconds(step);
        }
        TimeSeries { stamps, values }
    }
}

/// Read a `datetime;value` sensor file.
///
/// The first column is a timestamp in one of the accepted formats, the
/// second a float. Rows may be unsorted; duplicate timestamps are averaged.
pub fn read_sensor_file(path: &Path) -> Result<TimeSeries, SeriesError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)
        .map_err(|source| SeriesError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| SeriesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let stamp_field = record.get(0).unwrap_or("");
        let value_field = record.get(1).unwrap_or("");
        // gaps in sensor coverage appear as empty value fields
        if value_field.trim().is_empty() {
            continue;
        }
        let stamp = parse_sensor_datetime(stamp_field).ok_or_else(|| SeriesError::Parse {
            path: path.to_path_buf(),
            message: format!("bad timestamp '{stamp_field}'"),
        })?;
        let value: f64 = value_field
            .trim()
            .parse()
            .map_err(|_| SeriesError::Parse {
                path: path.to_path_buf(),
                message: format!("bad value '{value_field}'"),
            })?;
        pairs.push((stamp, value));
    }
    debug!(path = %path.display(), rows = pairs.len(), "read sensor file");
    Ok(TimeSeries::from_unordered(pairs))
}

fn parse_sensor_datetime(field: &str) -> Option<NaiveDateTime> {
    let field = field.trim();
    SENSOR_DT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(field, format).ok())
}

/// Observation series for all channels of an experiment, scaled to model
/// units and resampled to the reporting step. Windows for individual events
/// are cut from these with [`ObservationSet::for_event`].
#[derive(Debug, Clone)]
pub struct ObservationSet {
    series: HashMap<String, TimeSeries>,
}

impl ObservationSet {
    /// Wrap series that are already scaled and resampled (tests, callers
    /// with their own loading pipeline).
    pub fn from_series(series: HashMap<String, TimeSeries>) -> Self {
        Self { series }
    }

    /// Load every channel's sensor file, apply its unit scale factor and
    /// resample to the reporting step.
    pub fn load(channels: &[Channel], step_sec: u32) -> Result<Self, SeriesError> {
        let mut series = HashMap::new();
        for channel in channels {
            let path = channel
                .data_file
                .as_deref()
                .ok_or_else(|| SeriesError::MissingDataFile {
                    channel: channel.name.clone(),
                })?;
            let data = read_sensor_file(path)?
                .scaled(channel.scale_factor)
                .resample_mean(step_sec);
            series.insert(channel.name.clone(), data);
        }
        Ok(Self { series })
    }

    pub fn series(&self, name: &str) -> Option<&TimeSeries> {
        self.series.get(name)
    }

    /// Cut the requested channels down to an event window. The window is
    /// shrunk by one reporting step on both ends so warm-up and shut-down
    /// artifacts of the engine never enter the score.
    pub fn for_event(
        &self,
        names: &[String],
        event: &Event,
        step_sec: u32,
    ) -> Result<HashMap<String, TimeSeries>, SeriesError> {
        let shift = Duration::seconds(i64::from(step_sec));
        let mut windows = HashMap::new();
        for name in names {
            let series = self
                .series
                .get(name)
                .ok_or_else(|| SeriesError::MissingSeries {
                    channel: name.clone(),
                })?;
            windows.insert(name.clone(), series.clip(event.start + shift, event.end - shift));
        }
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;

    use super::*;
    use crate::types::MetricKind;

    fn dt(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 10, 6)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
            + Duration::seconds(secs)
    }

    fn series(points: &[(i64, f64)]) -> TimeSeries {
        TimeSeries::new(
            points.iter().map(|(s, _)| dt(*s)).collect(),
            points.iter().map(|(_, v)| *v).collect(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let err = TimeSeries::new(vec![dt(0), dt(5), dt(5)], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, SeriesError::NonMonotonic { index: 2 }));
    }

    #[test]
    fn inner_join_intersects_on_timestamps() {
        let a = series(&[(0, 1.0), (5, 2.0), (10, 3.0), (15, 4.0)]);
        let b = series(&[(5, 20.0), (15, 40.0), (20, 50.0)]);
        assert_eq!(a.inner_join(&b), vec![(2.0, 20.0), (4.0, 40.0)]);
    }

    #[test]
    fn inner_join_without_overlap_is_empty() {
        let a = series(&[(0, 1.0), (5, 2.0)]);
        let b = series(&[(7, 1.0), (12, 2.0)]);
        assert!(a.inner_join(&b).is_empty());
    }

    #[test]
    fn clip_is_inclusive() {
        let a = series(&[(0, 1.0), (5, 2.0), (10, 3.0), (15, 4.0)]);
        let clipped = a.clip(dt(5), dt(10));
        assert_eq!(clipped.values(), &[2.0, 3.0]);
    }

    #[test]
    fn resample_averages_cells_and_interpolates_gaps() {
        // two samples in the first cell, a hole at t=5, one sample at t=10
        let raw = series(&[(0, 1.0), (2, 3.0), (10, 6.0)]);
        let resampled = raw.resample_mean(5);
        assert_eq!(resampled.len(), 3);
        assert_eq!(resampled.values()[0], 2.0); // mean of 1.0 and 3.0
        assert_eq!(resampled.values()[1], 4.0); // interpolated between 2.0 and 6.0
        assert_eq!(resampled.values()[2], 6.0);
    }

    #[test]
    fn sensor_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "datetime;value").unwrap();
        writeln!(file, "2016-10-06 14:00:05;0.2").unwrap();
        writeln!(file, "2016-10-06 14:00:00;0.1").unwrap();
        writeln!(file, "2016-10-06 14:00:10;").unwrap();
        file.flush().unwrap();

        let data = read_sensor_file(file.path()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.values(), &[0.1, 0.2]); // sorted, gap skipped
    }

    #[test]
    fn observation_windows_shrink_by_one_step() {
        let full = series(&[(0, 1.0), (5, 2.0), (10, 3.0), (15, 4.0), (20, 5.0)]);
        let mut map = HashMap::new();
        map.insert("s6_sensor".to_string(), full);
        let observations = ObservationSet::from_series(map);

        let event = Event::new("Exp 21", dt(0), dt(20));
        let windows = observations
            .for_event(&["s6_sensor".to_string()], &event, 5)
            .unwrap();
        assert_eq!(windows["s6_sensor"].values(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn missing_channel_series_is_reported() {
        let observations = ObservationSet::from_series(HashMap::new());
        let event = Event::new("Exp 21", dt(0), dt(20));
        let err = observations
            .for_event(&["s6_sensor".to_string()], &event, 5)
            .unwrap_err();
        assert!(matches!(err, SeriesError::MissingSeries { .. }));
    }

    #[test]
    fn load_requires_a_data_file() {
        let channel = Channel::new("s6_sensor", "s6", MetricKind::Rmse, 1.0);
        let err = ObservationSet::load(&[channel], 5).unwrap_err();
        assert!(matches!(err, SeriesError::MissingDataFile { .. }));
    }
}
