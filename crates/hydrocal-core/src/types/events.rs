//! Calibration and validation events

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One rainfall/inflow event: a simulation time window plus the initial
/// conditions the network is in when it starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,

    /// Simulation start
    pub start: NaiveDateTime,

    /// Simulation end
    pub end: NaiveDateTime,

    /// Initial conditions substituted into the engine input (e.g. initial
    /// water depths per manhole), keyed by template slot name
    #[serde(default)]
    pub initial_conditions: BTreeMap<String, f64>,
}

impl Event {
    pub fn new(name: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            initial_conditions: BTreeMap::new(),
        }
    }

    pub fn with_initial_condition(mut self, slot: impl Into<String>, value: f64) -> Self {
        self.initial_conditions.insert(slot.into(), value);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start >= self.end {
            return Err(ConfigError::InvalidEventWindow {
                name: self.name.clone(),
                start: self.start.to_string(),
                end: self.end.to_string(),
            });
        }
        Ok(())
    }
}
