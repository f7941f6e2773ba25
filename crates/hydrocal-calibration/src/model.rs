//! Bridges candidate parameter sets to the external engine
//!
//! The model is the cheap-reject gate in front of the most expensive
//! operation in the system: out-of-bounds candidates never reach the
//! engine, and engine-native node identifiers are mapped back to channel
//! names on the way out.

use std::collections::HashMap;

use hydrocal_core::{
    Channel, EngineError, Event, ParameterSet, ParameterSpace, SimulationEngine, SimulationRequest,
    TimeSeries,
};
use tracing::debug;

use crate::error::ModelError;

/// A calibratable model: engine plus parameter space plus channel table.
#[derive(Debug, Clone)]
pub struct SimulationModel<E> {
    engine: E,
    space: ParameterSpace,
    channels: Vec<Channel>,
    reporting_step_sec: u32,
}

impl<E: SimulationEngine> SimulationModel<E> {
    pub fn new(
        engine: E,
        space: ParameterSpace,
        channels: Vec<Channel>,
        reporting_step_sec: u32,
    ) -> Self {
        Self {
            engine,
            space,
            channels,
            reporting_step_sec,
        }
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    pub fn reporting_step_sec(&self) -> u32 {
        self.reporting_step_sec
    }

    fn channel(&self, name: &str) -> Result<&Channel, ModelError> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ModelError::MissingChannel {
                channel: name.to_string(),
            })
    }

    /// Simulate `event` with `parameters` and return the series for the
    /// requested channels, keyed by channel name.
    ///
    /// Candidates outside the parameter bounds are rejected before the
    /// engine is invoked.
    pub fn run(
        &self,
        parameters: &ParameterSet,
        event: &Event,
        channel_names: &[String],
    ) -> Result<HashMap<String, TimeSeries>, ModelError> {
        if let Err((name, value)) = self.space.check_bounds(parameters) {
            debug!(parameter = %name, value, "ignored: candidate outside bounds");
            return Err(ModelError::OutOfBounds { name, value });
        }

        // channels may share an engine node; request each node once
        let mut nodes: Vec<String> = Vec::new();
        for name in channel_names {
            let node = &self.channel(name)?.node;
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }

        let request = SimulationRequest {
            parameters: parameters.clone(),
            event: event.clone(),
            reporting_step_sec: self.reporting_step_sec,
            nodes,
        };
        let node_series = self.engine.simulate(&request)?;

        let mut by_channel = HashMap::with_capacity(channel_names.len());
        for name in channel_names {
            let node = &self.channel(name)?.node;
            let series = node_series
                .get(node)
                .ok_or_else(|| EngineError::MissingNode { node: node.clone() })?;
            by_channel.insert(name.clone(), series.clone());
        }
        Ok(by_channel)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::NaiveDate;
    use hydrocal_core::{MetricKind, ParameterDefinition};

    use super::*;

    /// Engine stub that counts invocations and returns a constant series
    /// for every requested node.
    struct CountingEngine {
        calls: Cell<usize>,
    }

    impl SimulationEngine for CountingEngine {
        fn simulate(
            &self,
            request: &SimulationRequest,
        ) -> Result<HashMap<String, TimeSeries>, EngineError> {
            self.calls.set(self.calls.get() + 1);
            let stamps = vec![request.event.start];
            Ok(request
                .nodes
                .iter()
                .map(|node| {
                    (
                        node.clone(),
                        TimeSeries::new(stamps.clone(), vec![1.0]).expect("valid series"),
                    )
                })
                .collect())
        }
    }

    fn model(engine: CountingEngine) -> SimulationModel<CountingEngine> {
        let space = ParameterSpace::new(vec![
            ParameterDefinition::new("s_r", 0, 0.0, 0.03),
            ParameterDefinition::new("c_w1", 1, 0.0, 10.0),
        ])
        .unwrap();
        let channels = vec![
            Channel::new("s6_sensor", "s6", MetricKind::Rmse, 1.0),
            Channel::new("s6_trend", "s6", MetricKind::SpearmanZero, -1.0),
        ];
        SimulationModel::new(engine, space, channels, 5)
    }

    fn event() -> Event {
        let start = NaiveDate::from_ymd_opt(2016, 10, 6)
            .unwrap()
            .and_hms_opt(14, 56, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2016, 10, 6)
            .unwrap()
            .and_hms_opt(15, 13, 0)
            .unwrap();
        Event::new("Exp 21", start, end)
    }

    #[test]
    fn out_of_bounds_candidate_never_reaches_the_engine() {
        let model = model(CountingEngine { calls: Cell::new(0) });
        let params = model.space().to_named(&[0.05, 1.0]).unwrap(); // s_r above 0.03

        let err = model
            .run(&params, &event(), &["s6_sensor".to_string()])
            .unwrap_err();
        assert!(matches!(err, ModelError::OutOfBounds { .. }));
        assert_eq!(model.engine.calls.get(), 0);
    }

    #[test]
    fn feasible_candidate_is_simulated_and_reshaped() {
        let model = model(CountingEngine { calls: Cell::new(0) });
        let params = model.space().to_named(&[0.01, 1.0]).unwrap();

        let names = vec!["s6_sensor".to_string(), "s6_trend".to_string()];
        let series = model.run(&params, &event(), &names).unwrap();
        assert_eq!(model.engine.calls.get(), 1);
        // both channels resolve through the shared node
        assert!(series.contains_key("s6_sensor"));
        assert!(series.contains_key("s6_trend"));
    }
}
