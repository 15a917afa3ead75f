//! One-time collection preparation before the measured run.

use tracing::{info, instrument};

use crate::backend::{CollectionSchema, IndexSpec, VectorBackend};
use crate::config::RunConfig;
use crate::context::RunContext;
use crate::error::{HarnessError, Result};

/// Make sure the collection exists with the harness schema and is loaded.
///
/// With `collection.recreate` set, an existing collection is dropped and
/// rebuilt (schema, vector index, partition). Otherwise an existing
/// collection is reused as-is and only loaded.
#[instrument(skip_all, fields(collection = %config.collection.name))]
pub async fn prepare_collection(backend: &dyn VectorBackend, config: &RunConfig) -> Result<()> {
    let name = &config.collection.name;

    let exists = backend
        .has_collection(name)
        .await
        .map_err(|e| HarnessError::setup("has_collection", e))?;

    if exists && config.collection.recreate {
        info!("Dropping existing collection");
        backend
            .drop_collection(name)
            .await
            .map_err(|e| HarnessError::setup("drop_collection", e))?;
    }

    if !exists || config.collection.recreate {
        backend
            .create_collection(&CollectionSchema::from_config(config))
            .await
            .map_err(|e| HarnessError::setup("create_collection", e))?;
        backend
            .create_index(name, &IndexSpec::from_config(config))
            .await
            .map_err(|e| HarnessError::setup("create_index", e))?;
        backend
            .create_partition(name, &config.collection.partition)
            .await
            .map_err(|e| HarnessError::setup("create_partition", e))?;
        info!(dim = config.collection.dim, "Collection created");
    } else {
        info!("Reusing existing collection");
    }

    backend
        .load_collection(name)
        .await
        .map_err(|e| HarnessError::setup("load_collection", e))?;
    Ok(())
}

/// Insert the unmeasured warm-up batches.
///
/// Preload draws iteration indices from the run's counter, so measured
/// writes never reuse its primary keys. Latencies are not recorded.
pub async fn preload(ctx: &RunContext) -> Result<u64> {
    let config = ctx.config();
    let batches = config.workload.preload_batches;
    let generator = ctx.generator();

    for _ in 0..batches {
        let iteration = ctx.next_iteration();
        let batch = generator.insert_batch(&mut generator.rng_for(iteration), iteration);
        ctx.writer()
            .insert(
                &config.collection.name,
                &config.collection.partition,
                ctx.fields(),
                &batch,
            )
            .await
            .map_err(|e| HarnessError::setup("preload", e))?;
    }

    if batches > 0 {
        info!(
            batches,
            rows = batches * config.workload.rows_per_insert as u64,
            "Preload complete"
        );
    }
    Ok(batches)
}
