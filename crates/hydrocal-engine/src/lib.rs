//! External-process engine adapter for hydrodynamic sewer-network models.
//!
//! Implements the [`hydrocal_core::SimulationEngine`] boundary for a
//! simulator living in an external executable: the [`InputTemplate`]
//! materializes each candidate into the engine's input format, a bounded
//! [`SlotPool`] keeps concurrent invocations in isolated working
//! directories, and the output reader turns the engine's result file back
//! into per-node time series.

pub mod external;
pub mod forcing;
pub mod output;
pub mod slots;
pub mod template;

pub use external::ExternalEngine;
pub use forcing::write_forcing_file;
pub use output::read_output_file;
pub use slots::{Slot, SlotPool};
pub use template::InputTemplate;
