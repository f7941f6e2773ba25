//! The objective-function engine
//!
//! Converts a simulated and an observed multi-channel series into one
//! weighted scalar fitness. The rank-correlation hybrid handles the
//! zero-dominated regimes of intermittent sewer flow, where plain Spearman
//! correlation is undefined or structurally misleading.

use std::collections::HashMap;

use hydrocal_core::{check_convention, Channel, ConfigError, Direction, MetricKind, TimeSeries};
use tracing::trace;

use crate::error::ModelError;

/// Below this many jointly-positive samples the rank correlation is treated
/// as evidence-free and contributes 0.
pub const MIN_CORRELATION_SAMPLES: usize = 10;

/// Weighted multi-channel similarity scoring.
#[derive(Debug, Clone)]
pub struct ObjectiveFunction {
    channels: Vec<Channel>,
    direction: Direction,
}

impl ObjectiveFunction {
    /// Build the scorer for a channel subset. Every channel's weight sign
    /// must agree with `direction`; a mixture is a configuration error.
    pub fn new(channels: Vec<Channel>, direction: Direction) -> Result<Self, ConfigError> {
        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        for channel in &channels {
            check_convention(channel, direction)?;
        }
        Ok(Self {
            channels,
            direction,
        })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Score a simulation against observations.
    ///
    /// Channels absent from `observed` are skipped (no evidence); a channel
    /// absent from `simulated` is an evaluation failure the caller converts
    /// into penalty fitness. Alignment with no overlap contributes each
    /// metric's defined edge case, never an error.
    pub fn evaluate(
        &self,
        simulated: &HashMap<String, TimeSeries>,
        observed: &HashMap<String, TimeSeries>,
    ) -> Result<f64, ModelError> {
        let mut total = 0.0;
        for channel in &self.channels {
            let Some(obs) = observed.get(&channel.name) else {
                continue;
            };
            let sim = simulated
                .get(&channel.name)
                .ok_or_else(|| ModelError::MissingChannel {
                    channel: channel.name.clone(),
                })?;

            let mut pairs = sim.inner_join(obs);
            clamp_zeros(&mut pairs, channel);

            let value = match channel.metric {
                MetricKind::Rmse => rmse(&pairs),
                MetricKind::SpearmanHybrid => spearman_hybrid(&pairs),
                MetricKind::SpearmanZero => spearman_zero(&pairs),
            };
            trace!(
                channel = %channel.name,
                metric = %channel.metric,
                value,
                samples = pairs.len(),
                "channel metric"
            );
            total += channel.weight * value;
        }
        Ok(total)
    }
}

/// Coerce values at or below the channel's thresholds to 0, each series
/// independently.
fn clamp_zeros(pairs: &mut [(f64, f64)], channel: &Channel) {
    if let Some(threshold) = channel.zero_threshold_sim {
        for (sim, _) in pairs.iter_mut() {
            if *sim <= threshold {
                *sim = 0.0;
            }
        }
    }
    if let Some(threshold) = channel.zero_threshold_obs {
        for (_, obs) in pairs.iter_mut() {
            if *obs <= threshold {
                *obs = 0.0;
            }
        }
    }
}

/// Root-mean-square of pairwise differences. Empty alignment scores 0.
pub fn rmse(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = pairs.iter().map(|(sim, obs)| (sim - obs).powi(2)).sum();
    (sum_sq / pairs.len() as f64).sqrt()
}

/// Zero-aware rank-correlation hybrid.
///
/// Samples where both series are non-positive count as matching quiescent
/// state; Spearman rank correlation is computed over the samples where both
/// are positive. The result
/// `fraction_matching_zero + rho * fraction_positive` rewards agreement on
/// dry periods and rank agreement during wet periods; its range is roughly
/// [-1, 2] with 2 unattainable and 1 the all-dry optimum.
pub fn spearman_hybrid(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let n = pairs.len() as f64;

    let matching_zero = pairs
        .iter()
        .filter(|(sim, obs)| *sim <= 0.0 && *obs <= 0.0)
        .count();
    let positive: Vec<(f64, f64)> = pairs
        .iter()
        .filter(|(sim, obs)| *sim > 0.0 && *obs > 0.0)
        .copied()
        .collect();

    let fraction_matching_zero = matching_zero as f64 / n;
    let fraction_positive = positive.len() as f64 / n;

    // too little joint flow to support a correlation claim
    let rho = if positive.len() < MIN_CORRELATION_SAMPLES {
        0.0
    } else {
        let sims: Vec<f64> = positive.iter().map(|(sim, _)| *sim).collect();
        let obs: Vec<f64> = positive.iter().map(|(_, o)| *o).collect();
        spearman_rho(&sims, &obs).unwrap_or(0.0)
    };

    fraction_matching_zero + rho * fraction_positive
}

/// [`spearman_hybrid`] shifted so the optimum sits at 0, for use as a
/// cost-like term next to rmse.
pub fn spearman_zero(pairs: &[(f64, f64)]) -> f64 {
    spearman_hybrid(pairs) - 1.0
}

/// Spearman rank correlation: Pearson correlation of average ranks.
/// `None` when either rank series has zero variance.
fn spearman_rho(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let rx = average_ranks(xs);
    let ry = average_ranks(ys);
    let n = rx.len() as f64;

    let mean_x = rx.iter().sum::<f64>() / n;
    let mean_y = ry.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in rx.iter().zip(&ry) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        None
    } else {
        Some(cov / denom)
    }
}

/// Average (fractional) ranks, 1-based, ties sharing their mean rank.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // ranks i+1 ..= j+1 averaged over the tie group
        let rank = (i + 1 + j + 1) as f64 / 2.0;
        for &index in &order[i..=j] {
            ranks[index] = rank;
        }
        i = j + 1;
    }
    ranks
}
