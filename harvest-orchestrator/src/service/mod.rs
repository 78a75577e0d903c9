//! Service Module
//!
//! Business logic layer for the orchestrator: the lifecycle facade and the
//! background monitor and schedule machinery it drives.

pub mod monitor;
pub mod orchestrator;
pub mod scheduler;

// Re-export for convenience
pub use orchestrator::{Orchestrator, OrchestratorDeps, OrchestratorError};
