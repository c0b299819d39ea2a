// Gameflow scout: phase-driven team data orchestration for the League client

pub mod config;
pub mod error;
pub mod gameflow;
pub mod lcu;
pub mod logging;

pub use config::ScoutConfig;
pub use error::{Result, ScoutError};
pub use gameflow::{Orchestrator, OrchestratorHandle};
