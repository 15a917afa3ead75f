//! Load generator for Milvus-style vector databases.
//!
//! This crate provides tools to:
//! - Prepare a collection with a fixed primary-key/scalar/vector schema
//! - Drive it with rounds of concurrent inserts and searches
//! - Capture raw per-operation latency samples without loss
//! - Export the samples as one value per line for offline analysis

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod export;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod setup;
pub mod workload;

pub use backend::{RestBackend, VectorBackend};
pub use config::{ClassSelection, LatencyRecording, RunConfig};
pub use context::RunContext;
pub use error::{BackendError, HarnessError, Result};
pub use export::ResultExporter;
pub use metrics::{RunSummary, SampleRecorder, SeriesSummary};
pub use report::ResultsReport;
pub use runner::{LoadRunner, RunOutcome};
pub use scheduler::{RoundScheduler, SchedulerState};
pub use workload::{OperationClass, WorkUnit, WorkloadGenerator};
