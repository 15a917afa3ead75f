//! Timed write and query primitives.
//!
//! Each executor wraps exactly one backend call, measures its wall-clock
//! time and reports the sample to the run's recorder. Failed calls are
//! recorded or skipped according to [`LatencyRecording`]. Nothing is retried.

use std::future::Future;
use std::time::Instant;

use tracing::debug;

use crate::backend::{BackendResult, SearchRequest};
use crate::config::LatencyRecording;
use crate::context::RunContext;
use crate::error::BackendError;
use crate::workload::{InsertBatch, OperationClass, WorkUnit};

/// Run one work unit against the backend.
pub async fn execute(ctx: &RunContext, unit: WorkUnit) -> BackendResult<()> {
    match unit {
        WorkUnit::Write { iteration, batch } => execute_write(ctx, iteration, &batch).await,
        WorkUnit::Query { vectors } => execute_query(ctx, &vectors).await,
    }
}

/// Insert one batch through the writer handle.
pub async fn execute_write(ctx: &RunContext, iteration: u64, batch: &InsertBatch) -> BackendResult<()> {
    let config = ctx.config();
    let call = ctx.writer().insert(
        &config.collection.name,
        &config.collection.partition,
        ctx.fields(),
        batch,
    );
    let rows = timed(ctx, OperationClass::Write, call).await?;
    debug!(iteration, rows, "write complete");
    Ok(())
}

/// Search with the given query vectors through the reader handle.
pub async fn execute_query(ctx: &RunContext, vectors: &[Vec<f32>]) -> BackendResult<()> {
    let config = ctx.config();
    let request = SearchRequest {
        collection: &config.collection.name,
        partitions: ctx.partitions(),
        filter: ctx.filter(),
        output_fields: ctx.output_fields(),
        vectors,
        vector_field: &config.collection.vector_field,
        metric: config.index.metric,
        top_k: config.search.top_k,
        nprobe: config.search.nprobe,
    };
    let hits = timed(ctx, OperationClass::Query, ctx.reader().search(&request)).await?;
    debug!(hits, "query complete");
    Ok(())
}

/// Await `call` under the run's optional deadline and record its latency.
async fn timed<T, F>(ctx: &RunContext, class: OperationClass, call: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    let start = Instant::now();
    let result = match ctx.call_timeout() {
        Some(deadline) => match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(deadline.as_millis() as u64)),
        },
        None => call.await,
    };
    let elapsed = start.elapsed();

    if result.is_ok() || ctx.latency_recording() == LatencyRecording::Always {
        ctx.recorder().record(class, elapsed);
    }
    result
}
