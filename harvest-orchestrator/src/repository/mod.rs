//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity;
//! `store` wraps them behind the `JobStore` trait the services use.

pub mod job;
#[cfg(test)]
pub mod memory;
pub mod seed;
pub mod stat;
pub mod store;

// Re-export for convenience
pub use job as job_repository;
pub use seed as seed_repository;
pub use stat as stat_repository;
pub use store::{JobStore, PgJobStore};
