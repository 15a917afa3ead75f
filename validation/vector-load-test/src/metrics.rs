//! Latency sample collection and run results.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::workload::OperationClass;

/// Thread-safe recorder of per-class latency samples in milliseconds.
///
/// Each class has its own lock so write and query recordings never
/// contend. Samples are kept in completion order.
#[derive(Debug, Default)]
pub struct SampleRecorder {
    writes: Mutex<Vec<u64>>,
    queries: Mutex<Vec<u64>>,
}

impl SampleRecorder {
    /// Create a new, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn series(&self, class: OperationClass) -> MutexGuard<'_, Vec<u64>> {
        let lock = match class {
            OperationClass::Write => &self.writes,
            OperationClass::Query => &self.queries,
        };
        // push never leaves a series half-written, so a poisoned lock still guards valid data
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an elapsed duration, truncated to whole milliseconds.
    pub fn record(&self, class: OperationClass, elapsed: Duration) {
        self.record_ms(class, elapsed.as_millis() as u64);
    }

    /// Record a sample already expressed in milliseconds.
    pub fn record_ms(&self, class: OperationClass, latency_ms: u64) {
        self.series(class).push(latency_ms);
    }

    /// Snapshot of a series in recorded order.
    pub fn drain(&self, class: OperationClass) -> Vec<u64> {
        self.series(class).clone()
    }

    pub fn len(&self, class: OperationClass) -> usize {
        self.series(class).len()
    }

    pub fn is_empty(&self) -> bool {
        OperationClass::ALL.iter().all(|c| self.len(*c) == 0)
    }

    /// Count/min/max/mean of one series.
    pub fn summary(&self, class: OperationClass) -> SeriesSummary {
        SeriesSummary::from_samples(class, &self.series(class))
    }
}

/// Basic aggregate over one latency series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub class: OperationClass,
    pub count: usize,
    pub min_ms: Option<u64>,
    pub max_ms: Option<u64>,
    pub mean_ms: Option<f64>,
}

impl SeriesSummary {
    pub fn from_samples(class: OperationClass, samples: &[u64]) -> Self {
        let mean_ms = if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<u64>() as f64 / samples.len() as f64)
        };
        Self {
            class,
            count: samples.len(),
            min_ms: samples.iter().min().copied(),
            max_ms: samples.iter().max().copied(),
            mean_ms,
        }
    }
}

/// Final results of a harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub scenario_name: String,
    pub backend_address: String,
    pub duration_secs: f64,
    pub total_rounds: u64,
    pub units_per_round: usize,
    pub rounds_completed: u64,
    pub invocations_issued: u64,
    pub iterations_consumed: u64,
    pub writes: SeriesSummary,
    pub queries: SeriesSummary,

    // Set when the run ended on a fatal error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl RunSummary {
    pub fn samples_total(&self) -> usize {
        self.writes.count + self.queries.count
    }

    pub fn completed(&self) -> bool {
        self.aborted.is_none()
    }
}
