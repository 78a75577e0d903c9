//! Core domain types
//!
//! This module contains the core domain structures used across Harvest services.
//! These types represent the crawl jobs the orchestrator persists and the
//! statistics it records while a job runs on the execution cluster.

pub mod job;
pub mod stat;
