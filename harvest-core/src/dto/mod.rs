//! Data Transfer Objects for the orchestrator HTTP API
//!
//! Request and response bodies exchanged with API clients.

pub mod job;
