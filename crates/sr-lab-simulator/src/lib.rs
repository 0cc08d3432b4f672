pub mod engine;
pub mod error;
pub mod scenario_runner;
pub mod timer;
pub mod trace;

pub use engine::{LinkEventSummary, NodeId, Simulator};
pub use error::SimError;
pub use trace::SimulationReport;
