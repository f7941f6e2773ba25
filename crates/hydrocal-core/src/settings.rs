//! Immutable experiment configuration
//!
//! An [`ExperimentSettings`] value is constructed once at experiment start,
//! validated fail-fast, and passed by reference to every component. Nothing
//! mutates it afterwards; the serialized snapshot written next to the
//! results is byte-for-byte the configuration the run actually used.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Channel, Event, Orientation, ParameterDefinition, ParameterSpace};

/// Fixed optimization direction of an experiment.
///
/// Channel weights must be chosen so every weighted metric contribution
/// improves in this direction; [`ExperimentSettings::validate`] rejects
/// mixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Fitness is a cost; lower is better
    #[default]
    #[serde(rename = "minimize")]
    Minimize,

    /// Fitness is a score; higher is better
    #[serde(rename = "maximize")]
    Maximize,
}

/// Sentinel fitness magnitude for rejected or failed evaluations.
const PENALTY_FITNESS: f64 = 1.0e8;

impl Direction {
    /// True if `candidate` is strictly better than `incumbent`.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }

    /// Worst-case sentinel fitness, used for bounds violations and engine
    /// failures so the search steers away without aborting.
    pub fn worst(&self) -> f64 {
        match self {
            Direction::Minimize => PENALTY_FITNESS,
            Direction::Maximize => -PENALTY_FITNESS,
        }
    }

    /// Map a raw fitness onto a cost for solvers that always minimize.
    pub fn as_cost(&self, fitness: f64) -> f64 {
        match self {
            Direction::Minimize => fitness,
            Direction::Maximize => -fitness,
        }
    }

    /// Best-first ordering of raw fitness values.
    pub fn compare(&self, a: f64, b: f64) -> std::cmp::Ordering {
        match self {
            Direction::Minimize => a.total_cmp(&b),
            Direction::Maximize => b.total_cmp(&a),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Minimize => "minimize",
            Direction::Maximize => "maximize",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The full configuration of one calibration experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSettings {
    /// Calibration parameters with bounds and vector ranks
    pub parameters: Vec<ParameterDefinition>,

    /// All known observation channels
    pub channels: Vec<Channel>,

    /// Channel names scored during the search
    pub calibration_channels: Vec<String>,

    /// Channel names scored during validation (may differ from the
    /// calibration subset)
    pub validation_channels: Vec<String>,

    /// The event the optimizer is tuned against
    pub calibration_event: Event,

    /// Independent events used only for scoring
    #[serde(default)]
    pub validation_events: Vec<Event>,

    /// Reporting resolution of observed and simulated series, in seconds
    pub reporting_step_sec: u32,

    /// Fixed sign convention for the aggregate fitness
    #[serde(default)]
    pub direction: Direction,

    /// Also score the chosen parameter sets on the calibration event during
    /// validation
    #[serde(default)]
    pub revalidate_calibration_event: bool,
}

impl ExperimentSettings {
    /// Fail-fast validation of the whole configuration; called before any
    /// engine invocation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.space()?;

        if self.channels.is_empty() || self.calibration_channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        for (i, channel) in self.channels.iter().enumerate() {
            if self.channels[..i].iter().any(|c| c.name == channel.name) {
                return Err(ConfigError::DuplicateChannel {
                    name: channel.name.clone(),
                });
            }
        }

        self.check_subset(&self.calibration_channels, "calibration")?;
        self.check_subset(&self.validation_channels, "validation")?;

        if self.reporting_step_sec == 0 {
            return Err(ConfigError::InvalidReportingStep);
        }
        self.calibration_event.validate()?;
        for event in &self.validation_events {
            event.validate()?;
        }
        Ok(())
    }

    fn check_subset(&self, names: &[String], subset: &str) -> Result<(), ConfigError> {
        for name in names {
            let channel = self.channel(name).ok_or_else(|| ConfigError::UnknownChannel {
                name: name.clone(),
                subset: subset.to_string(),
            })?;
            check_convention(channel, self.direction)?;
        }
        Ok(())
    }

    /// The bounded search space defined by `parameters`.
    pub fn space(&self) -> Result<ParameterSpace, ConfigError> {
        ParameterSpace::new(self.parameters.clone())
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Channels of the calibration subset, in subset order.
    pub fn calibration_set(&self) -> Vec<Channel> {
        self.subset(&self.calibration_channels)
    }

    /// Channels of the validation subset, in subset order.
    pub fn validation_set(&self) -> Vec<Channel> {
        self.subset(&self.validation_channels)
    }

    fn subset(&self, names: &[String]) -> Vec<Channel> {
        names
            .iter()
            .filter_map(|name| self.channel(name).cloned())
            .collect()
    }
}

/// A channel's weighted contribution must improve in the experiment's
/// direction: cost-like metrics need positive weights under `minimize` and
/// negative under `maximize`, score-like metrics the opposite.
pub fn check_convention(channel: &Channel, direction: Direction) -> Result<(), ConfigError> {
    let consistent = match (channel.metric.orientation(), direction) {
        (Orientation::Cost, Direction::Minimize) => channel.weight > 0.0,
        (Orientation::Cost, Direction::Maximize) => channel.weight < 0.0,
        (Orientation::Score, Direction::Minimize) => channel.weight < 0.0,
        (Orientation::Score, Direction::Maximize) => channel.weight > 0.0,
    };
    if consistent {
        Ok(())
    } else {
        Err(ConfigError::MixedConvention {
            channel: channel.name.clone(),
            metric: channel.metric.name().to_string(),
            weight: channel.weight,
            direction: direction.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::types::MetricKind;

    fn settings() -> ExperimentSettings {
        let start = NaiveDate::from_ymd_opt(2016, 10, 6)
            .unwrap()
            .and_hms_opt(14, 56, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2016, 10, 6)
            .unwrap()
            .and_hms_opt(15, 13, 0)
            .unwrap();
        ExperimentSettings {
            parameters: vec![
                ParameterDefinition::new("s_r", 0, 0.0, 0.03),
                ParameterDefinition::new("c_w1", 1, 0.0, 10.0),
            ],
            channels: vec![
                Channel::new("s6_sensor", "s6", MetricKind::Rmse, 1.0).with_scale_factor(0.001),
                Channel::new("s6_trend", "s6", MetricKind::SpearmanZero, -1.0),
            ],
            calibration_channels: vec!["s6_trend".to_string()],
            validation_channels: vec!["s6_sensor".to_string()],
            calibration_event: Event::new("Exp 21", start, end),
            validation_events: vec![],
            reporting_step_sec: 5,
            direction: Direction::Minimize,
            revalidate_calibration_event: false,
        }
    }

    #[test]
    fn valid_settings_pass() {
        settings().validate().unwrap();
    }

    #[test]
    fn unknown_subset_channel_is_rejected() {
        let mut s = settings();
        s.calibration_channels = vec!["s5_sensor".to_string()];
        let err = s.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownChannel { .. }));
    }

    #[test]
    fn mixed_sign_convention_is_rejected() {
        let mut s = settings();
        // score-like metric with a positive weight cannot be minimized
        s.channels[1].weight = 1.0;
        let err = s.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MixedConvention { .. }));
    }

    #[test]
    fn inverted_event_window_is_rejected() {
        let mut s = settings();
        std::mem::swap(&mut s.calibration_event.start, &mut s.calibration_event.end);
        let err = s.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEventWindow { .. }));
    }

    #[test]
    fn direction_ordering_and_penalty() {
        assert!(Direction::Minimize.is_better(1.0, 2.0));
        assert!(Direction::Maximize.is_better(2.0, 1.0));
        assert!(Direction::Minimize.worst() > 0.0);
        assert!(Direction::Maximize.worst() < 0.0);
        assert_eq!(Direction::Maximize.as_cost(1.5), -1.5);
    }
}
