//! Observation channels and their scoring configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Similarity metric computed over one aligned channel pair.
///
/// The set is closed: unknown kinds are rejected when the configuration is
/// deserialized, not at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// Root-mean-square error over aligned samples. Lower is better.
    #[serde(rename = "rmse")]
    Rmse,

    /// Rank correlation blended with agreement on quiescent (zero) periods.
    /// Higher is better; range is approximately [-1, 2].
    #[serde(rename = "spearman_hybrid")]
    SpearmanHybrid,

    /// `spearman_hybrid - 1`, shifting the optimum to 0 so the metric can sit
    /// next to cost-like metrics in one weighted sum.
    #[serde(rename = "spearman_zero")]
    SpearmanZero,
}

/// Whether a metric's raw value improves downward or upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Lower raw values are better (e.g. rmse)
    Cost,
    /// Higher raw values are better (e.g. rank correlation)
    Score,
}

impl MetricKind {
    /// The metric's natural orientation, used to validate weight signs
    /// against the experiment's optimization direction.
    pub fn orientation(&self) -> Orientation {
        match self {
            MetricKind::Rmse => Orientation::Cost,
            MetricKind::SpearmanHybrid | MetricKind::SpearmanZero => Orientation::Score,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Rmse => "rmse",
            MetricKind::SpearmanHybrid => "spearman_hybrid",
            MetricKind::SpearmanZero => "spearman_zero",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One named observed/simulated stream pair used in scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name as referenced by the calibration/validation subsets
    pub name: String,

    /// Engine-side node identifier the simulated series is extracted from
    pub node: String,

    /// Multiplier applied to raw sensor values (unit conversion)
    pub scale_factor: f64,

    /// Metric computed for this channel
    pub metric: MetricKind,

    /// Contribution weight in the aggregate fitness
    pub weight: f64,

    /// Simulated values at or below this threshold are coerced to 0 before
    /// scoring
    #[serde(default)]
    pub zero_threshold_sim: Option<f64>,

    /// Observed values at or below this threshold are coerced to 0 before
    /// scoring
    #[serde(default)]
    pub zero_threshold_obs: Option<f64>,

    /// Sensor data file backing this channel, if observations are loaded
    /// from disk
    #[serde(default)]
    pub data_file: Option<PathBuf>,
}

impl Channel {
    pub fn new(
        name: impl Into<String>,
        node: impl Into<String>,
        metric: MetricKind,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            scale_factor: 1.0,
            metric,
            weight,
            zero_threshold_sim: None,
            zero_threshold_obs: None,
            data_file: None,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_zero_thresholds(mut self, sim: f64, obs: f64) -> Self {
        self.zero_threshold_sim = Some(sim);
        self.zero_threshold_obs = Some(obs);
        self
    }

    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }
}
