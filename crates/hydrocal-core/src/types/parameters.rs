//! Calibration parameter definitions and the rank-ordered parameter space

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Named parameter values, keyed by parameter name.
///
/// Must contain exactly the names of the active [`ParameterSpace`] to be
/// convertible to vector form.
pub type ParameterSet = BTreeMap<String, f64>;

/// One calibration parameter with its physical bounds.
///
/// `rank` fixes the parameter's position in the positional vector form
/// consumed by the samplers; ranks of a space form a dense permutation of
/// `0..N-1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Parameter identifier as used in the engine input template
    pub name: String,

    /// Position in the positional vector representation (0-based)
    pub rank: usize,

    /// Minimum allowed value
    pub lower_bound: f64,

    /// Maximum allowed value
    pub upper_bound: f64,

    /// Human-readable name for reports
    pub display_name: String,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, rank: usize, lower_bound: f64, upper_bound: f64) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            rank,
            lower_bound,
            upper_bound,
        }
    }

    /// Set the display name used in reports
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Check if a value is within the parameter bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.lower_bound && value <= self.upper_bound
    }
}

/// The bounded search space: all parameter definitions, held in rank order.
///
/// Translates between the named-map representation used at the engine
/// boundary and the positional vector representation consumed by the
/// samplers. The two conversions are mutual inverses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpace {
    definitions: Vec<ParameterDefinition>,
}

impl ParameterSpace {
    /// Build a space from definitions, validating the rank permutation and
    /// the bounds ordering.
    pub fn new(mut definitions: Vec<ParameterDefinition>) -> Result<Self, ConfigError> {
        if definitions.is_empty() {
            return Err(ConfigError::NoParameters);
        }

        let n = definitions.len();
        let mut seen: Vec<Option<&str>> = vec![None; n];
        for def in &definitions {
            if def.rank >= n {
                return Err(ConfigError::InvalidRank {
                    name: def.name.clone(),
                    rank: def.rank,
                    expected: n,
                });
            }
            if let Some(first) = seen[def.rank] {
                return Err(ConfigError::DuplicateRank {
                    rank: def.rank,
                    first: first.to_string(),
                    second: def.name.clone(),
                });
            }
            seen[def.rank] = Some(&def.name);

            if def.lower_bound > def.upper_bound {
                return Err(ConfigError::InvalidBounds {
                    name: def.name.clone(),
                    lower: def.lower_bound,
                    upper: def.upper_bound,
                });
            }
        }

        definitions.sort_by_key(|d| d.rank);
        let mut names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(ConfigError::DuplicateParameter {
                    name: pair[0].to_string(),
                });
            }
        }

        Ok(Self { definitions })
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in rank order
    pub fn definitions(&self) -> &[ParameterDefinition] {
        &self.definitions
    }

    /// Parameter names in rank order
    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.name.clone()).collect()
    }

    /// Bounds as (lower, upper) tuples in rank order
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.definitions
            .iter()
            .map(|d| (d.lower_bound, d.upper_bound))
            .collect()
    }

    /// Convert a named parameter set to its positional vector.
    ///
    /// The set must contain exactly the names of this space.
    pub fn to_vector(&self, parameters: &ParameterSet) -> Result<Vec<f64>, ConfigError> {
        if parameters.len() != self.definitions.len() {
            return Err(ConfigError::ParameterMismatch {
                reason: format!(
                    "expected {} parameters, got {}",
                    self.definitions.len(),
                    parameters.len()
                ),
            });
        }
        let mut vector = Vec::with_capacity(self.definitions.len());
        for def in &self.definitions {
            match parameters.get(&def.name) {
                Some(value) => vector.push(*value),
                None => {
                    return Err(ConfigError::ParameterMismatch {
                        reason: format!("missing parameter '{}'", def.name),
                    });
                }
            }
        }
        Ok(vector)
    }

    /// Convert a positional vector back to the named representation.
    pub fn to_named(&self, vector: &[f64]) -> Result<ParameterSet, ConfigError> {
        if vector.len() != self.definitions.len() {
            return Err(ConfigError::ParameterMismatch {
                reason: format!(
                    "expected vector of length {}, got {}",
                    self.definitions.len(),
                    vector.len()
                ),
            });
        }
        Ok(self
            .definitions
            .iter()
            .zip(vector)
            .map(|(def, value)| (def.name.clone(), *value))
            .collect())
    }

    /// Check every value against its bounds; returns the first violation.
    pub fn check_bounds(&self, parameters: &ParameterSet) -> Result<(), (String, f64)> {
        for def in &self.definitions {
            if let Some(value) = parameters.get(&def.name) {
                if !def.is_within_bounds(*value) {
                    return Err((def.name.clone(), *value));
                }
            }
        }
        Ok(())
    }

    /// True if every value lies within its parameter's bounds.
    pub fn contains(&self, parameters: &ParameterSet) -> bool {
        self.check_bounds(parameters).is_ok()
    }

    /// Clamp a positional vector to the space's bounds.
    pub fn clamp(&self, vector: &[f64]) -> Vec<f64> {
        vector
            .iter()
            .zip(&self.definitions)
            .map(|(value, def)| value.clamp(def.lower_bound, def.upper_bound))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterDefinition::new("s_r", 0, 0.0, 0.03).with_display_name("Surface roughness"),
            ParameterDefinition::new("c_m1", 2, 0.0, 1.0),
            ParameterDefinition::new("r_p3", 1, 0.0, 0.03),
        ])
        .unwrap()
    }

    #[test]
    fn names_follow_rank_order() {
        assert_eq!(space().names(), vec!["s_r", "r_p3", "c_m1"]);
    }

    #[test]
    fn round_trip_is_lossless() {
        let space = space();
        let mut params = ParameterSet::new();
        params.insert("s_r".to_string(), 0.011);
        params.insert("r_p3".to_string(), 0.02);
        params.insert("c_m1".to_string(), 0.5);

        let vector = space.to_vector(&params).unwrap();
        assert_eq!(vector, vec![0.011, 0.02, 0.5]);
        assert_eq!(space.to_named(&vector).unwrap(), params);
    }

    #[test]
    fn missing_name_is_rejected() {
        let space = space();
        let mut params = ParameterSet::new();
        params.insert("s_r".to_string(), 0.01);
        params.insert("r_p3".to_string(), 0.02);
        params.insert("bogus".to_string(), 0.5);
        assert!(space.to_vector(&params).is_err());
    }

    #[test]
    fn sparse_ranks_are_rejected() {
        let err = ParameterSpace::new(vec![
            ParameterDefinition::new("a", 0, 0.0, 1.0),
            ParameterDefinition::new("b", 2, 0.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRank { rank: 2, .. }));
    }

    #[test]
    fn duplicate_ranks_are_rejected() {
        let err = ParameterSpace::new(vec![
            ParameterDefinition::new("a", 0, 0.0, 1.0),
            ParameterDefinition::new("b", 0, 0.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRank { rank: 0, .. }));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err =
            ParameterSpace::new(vec![ParameterDefinition::new("a", 0, 1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { .. }));
    }

    #[test]
    fn bounds_check_reports_first_violation() {
        let space = space();
        let mut params = space
            .to_named(&[0.01, 0.02, 0.5])
            .expect("vector matches space");
        assert!(space.contains(&params));

        params.insert("c_m1".to_string(), 1.5);
        let (name, value) = space.check_bounds(&params).unwrap_err();
        assert_eq!(name, "c_m1");
        assert_eq!(value, 1.5);
    }

    #[test]
    fn clamp_respects_bounds() {
        let space = space();
        assert_eq!(space.clamp(&[-1.0, 0.01, 7.0]), vec![0.0, 0.01, 1.0]);
    }
}
