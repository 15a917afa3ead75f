//! In-process backend double shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use vector_load_test::backend::{
    BackendResult, CollectionSchema, FieldNames, IndexSpec, SearchRequest, VectorBackend,
};
use vector_load_test::config::{ClassSelection, RunConfig};
use vector_load_test::workload::InsertBatch;
use vector_load_test::{BackendError, OperationClass};

/// Start or end of one measured call, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    End,
}

/// Backend that answers from memory and records what it saw.
#[derive(Default)]
pub struct MockBackend {
    /// Fail the n-th measured call (1-based, inserts and searches counted together)
    pub fail_on_call: Option<usize>,
    /// Fail the named setup step
    pub fail_setup: Option<&'static str>,
    pub collection_exists: bool,
    pub delay: Duration,
    /// Add `call_index % 4` milliseconds on top of `delay`
    pub jitter: bool,

    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub events: Mutex<Vec<Event>>,
    pub inserted_keys: Mutex<Vec<i64>>,
    pub classes: Mutex<Vec<OperationClass>>,
    pub setup_calls: Mutex<Vec<&'static str>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(n: usize) -> Self {
        Self {
            fail_on_call: Some(n),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn inserted_keys(&self) -> Vec<i64> {
        self.inserted_keys.lock().unwrap().clone()
    }

    pub fn distinct_keys(&self) -> usize {
        self.inserted_keys().into_iter().collect::<HashSet<_>>().len()
    }

    pub fn classes(&self) -> Vec<OperationClass> {
        self.classes.lock().unwrap().clone()
    }

    pub fn setup_calls(&self) -> Vec<&'static str> {
        self.setup_calls.lock().unwrap().clone()
    }

    fn setup_step(&self, step: &'static str) -> BackendResult<()> {
        self.setup_calls.lock().unwrap().push(step);
        if self.fail_setup == Some(step) {
            return Err(BackendError::rejected(1, format!("{} refused", step)));
        }
        Ok(())
    }

    async fn measured(&self, class: OperationClass) -> BackendResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().unwrap().push(Event::Start);
        self.classes.lock().unwrap().push(class);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut delay = self.delay;
        if self.jitter {
            delay += Duration::from_millis((call % 4) as u64);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::End);

        if self.fail_on_call == Some(call) {
            Err(BackendError::Transport(format!("injected failure on call {}", call)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VectorBackend for MockBackend {
    async fn has_collection(&self, _collection: &str) -> BackendResult<bool> {
        self.setup_step("has_collection")?;
        Ok(self.collection_exists)
    }

    async fn drop_collection(&self, _collection: &str) -> BackendResult<()> {
        self.setup_step("drop_collection")
    }

    async fn create_collection(&self, _schema: &CollectionSchema) -> BackendResult<()> {
        self.setup_step("create_collection")
    }

    async fn create_partition(&self, _collection: &str, _partition: &str) -> BackendResult<()> {
        self.setup_step("create_partition")
    }

    async fn create_index(&self, _collection: &str, _index: &IndexSpec) -> BackendResult<()> {
        self.setup_step("create_index")
    }

    async fn load_collection(&self, _collection: &str) -> BackendResult<()> {
        self.setup_step("load_collection")
    }

    async fn insert(
        &self,
        _collection: &str,
        _partition: &str,
        _fields: &FieldNames,
        batch: &InsertBatch,
    ) -> BackendResult<u64> {
        self.inserted_keys
            .lock()
            .unwrap()
            .extend_from_slice(&batch.primary_keys);
        self.measured(OperationClass::Write).await?;
        Ok(batch.len() as u64)
    }

    async fn search(&self, request: &SearchRequest<'_>) -> BackendResult<usize> {
        self.measured(OperationClass::Query).await?;
        Ok(request.vectors.len() * request.top_k)
    }
}

/// Small, fast configuration writing into `dir`.
pub fn test_config(dir: &Path, rounds: u64, units_per_round: usize) -> RunConfig {
    let mut config = RunConfig::default();
    config.name = "test".to_string();
    config.collection.dim = 4;
    config.search.nq = 2;
    config.workload.total_rounds = rounds;
    config.workload.units_per_round = units_per_round;
    config.workload.rows_per_insert = 3;
    config.workload.preload_batches = 0;
    config.workload.seed = Some(7);
    config.output.dir = dir.to_path_buf();
    config
}

pub fn always(class: OperationClass) -> ClassSelection {
    ClassSelection::Always { class }
}

/// Non-empty lines in an exported series file.
pub fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.is_empty())
        .count()
}
