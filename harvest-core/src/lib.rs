//! Harvest Core
//!
//! Core types for the Harvest crawl orchestrator.
//!
//! This crate contains:
//! - Domain types: crawl jobs, seed URLs and crawl statistics
//! - DTOs: request/response bodies for the HTTP API

pub mod domain;
pub mod dto;
