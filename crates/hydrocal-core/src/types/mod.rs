//! Domain types: parameters, channels, events

pub mod channels;
pub mod events;
pub mod parameters;

pub use channels::{Channel, MetricKind, Orientation};
pub use events::Event;
pub use parameters::{ParameterDefinition, ParameterSet, ParameterSpace};
