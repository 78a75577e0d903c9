//! Execution cluster integration
//!
//! Everything the orchestrator needs to run crawls on the cluster:
//! generating topology configs, submitting/killing topologies and reading
//! their runtime metrics.

pub mod execution;
pub mod metrics;
pub mod topology;

pub use execution::{ExecutionClient, ExecutionError, StormCli};
pub use metrics::{MetricsSource, StormUiMetrics};
pub use topology::TopologyConfig;
