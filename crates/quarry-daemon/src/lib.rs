//! Daemon wiring: CLI, logging, the per-cycle pipeline, and the scheduler.

pub mod cli;
pub mod logging;
pub mod pipeline;
pub mod scheduler;

pub use cli::Cli;
pub use pipeline::{CycleReport, Pipeline};
pub use scheduler::Scheduler;
