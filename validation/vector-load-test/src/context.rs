//! Run-scoped shared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{FieldNames, VectorBackend};
use crate::config::{LatencyRecording, RunConfig};
use crate::metrics::SampleRecorder;
use crate::workload::{OperationClass, WorkUnit, WorkloadGenerator};

/// RNG stream reserved for the fixed query batch.
const QUERY_VECTOR_STREAM: u64 = u64::MAX - 1;

/// Everything a single run shares between its concurrent invocations.
///
/// One instance per run; nothing here is process-global, so independent
/// runs can coexist in one process.
pub struct RunContext {
    config: Arc<RunConfig>,
    recorder: SampleRecorder,
    iterations: AtomicU64,
    writer: Arc<dyn VectorBackend>,
    reader: Arc<dyn VectorBackend>,
    generator: WorkloadGenerator,
    query_vectors: Arc<Vec<Vec<f32>>>,
    fields: FieldNames,
    partitions: Vec<String>,
    output_fields: Vec<String>,
    filter: String,
}

impl RunContext {
    /// Create a context using separate backend handles for writes and queries.
    pub fn new(
        config: Arc<RunConfig>,
        writer: Arc<dyn VectorBackend>,
        reader: Arc<dyn VectorBackend>,
    ) -> Self {
        let generator = WorkloadGenerator::new(
            config.workload.seed,
            config.collection.dim,
            config.workload.rows_per_insert,
        );
        let query_vectors = generator.query_vectors(
            &mut generator.rng_for(QUERY_VECTOR_STREAM),
            config.search.nq,
        );

        Self {
            recorder: SampleRecorder::new(),
            iterations: AtomicU64::new(0),
            writer,
            reader,
            generator,
            query_vectors: Arc::new(query_vectors),
            fields: FieldNames::from_config(&config),
            partitions: vec![config.collection.partition.clone()],
            output_fields: vec![
                config.collection.pk_field.clone(),
                config.collection.scalar_field.clone(),
            ],
            filter: config.search_filter(),
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn recorder(&self) -> &SampleRecorder {
        &self.recorder
    }

    pub fn writer(&self) -> &dyn VectorBackend {
        self.writer.as_ref()
    }

    pub fn reader(&self) -> &dyn VectorBackend {
        self.reader.as_ref()
    }

    pub fn generator(&self) -> &WorkloadGenerator {
        &self.generator
    }

    pub fn fields(&self) -> &FieldNames {
        &self.fields
    }

    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }

    pub fn output_fields(&self) -> &[String] {
        &self.output_fields
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn latency_recording(&self) -> LatencyRecording {
        self.config.workload.latency_recording
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.config.backend.call_timeout_ms.map(Duration::from_millis)
    }

    /// Claim the next write iteration. Each index is handed out exactly once per run.
    pub fn next_iteration(&self) -> u64 {
        self.iterations.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of iteration indices handed out so far (preload included).
    pub fn iterations_consumed(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Build the work unit for invocation `sequence` of the run.
    ///
    /// Writes claim their iteration index here, before any payload is generated.
    pub fn build_unit(&self, class: OperationClass, sequence: u64) -> WorkUnit {
        match class {
            OperationClass::Write => {
                let iteration = self.next_iteration();
                let mut rng = self.generator.rng_for(sequence);
                WorkUnit::Write {
                    iteration,
                    batch: self.generator.insert_batch(&mut rng, iteration),
                }
            }
            OperationClass::Query => {
                let vectors = if self.config.search.refresh_vectors {
                    let mut rng = self.generator.rng_for(sequence);
                    Arc::new(self.generator.query_vectors(&mut rng, self.config.search.nq))
                } else {
                    self.query_vectors.clone()
                };
                WorkUnit::Query { vectors }
            }
        }
    }
}
