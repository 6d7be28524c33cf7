//! reqgate library
//!
//! Exposes the page simulation used by the CLI and by integration tests.

pub mod simulation;

pub use simulation::{run_plan, Plan, SimulationReport, Step, TraceEntry};
