//! Vector database client abstraction.

mod rest;

pub use rest::RestBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{MetricType, RunConfig};
use crate::error::BackendError;
use crate::workload::InsertBatch;

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Operations the harness needs from a vector database.
///
/// Implementations are shared by every concurrent invocation of a run and
/// must be safe to call from many tasks at once.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn has_collection(&self, collection: &str) -> BackendResult<bool>;

    async fn drop_collection(&self, collection: &str) -> BackendResult<()>;

    async fn create_collection(&self, schema: &CollectionSchema) -> BackendResult<()>;

    async fn create_partition(&self, collection: &str, partition: &str) -> BackendResult<()>;

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> BackendResult<()>;

    async fn load_collection(&self, collection: &str) -> BackendResult<()>;

    /// Insert a batch of rows. Returns the number of rows acknowledged.
    async fn insert(
        &self,
        collection: &str,
        partition: &str,
        fields: &FieldNames,
        batch: &InsertBatch,
    ) -> BackendResult<u64>;

    /// Run a similarity search. Returns the number of hits across all queries.
    async fn search(&self, request: &SearchRequest<'_>) -> BackendResult<usize>;
}

/// Scalar and vector column types used by the harness schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    Double,
    FloatVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub dim: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub shards_num: u32,
}

impl CollectionSchema {
    /// Schema with an Int64 primary key, a Double scalar and a float vector field.
    pub fn from_config(config: &RunConfig) -> Self {
        let c = &config.collection;
        Self {
            name: c.name.clone(),
            fields: vec![
                FieldSchema {
                    name: c.pk_field.clone(),
                    data_type: DataType::Int64,
                    primary_key: true,
                    dim: None,
                },
                FieldSchema {
                    name: c.scalar_field.clone(),
                    data_type: DataType::Double,
                    primary_key: false,
                    dim: None,
                },
                FieldSchema {
                    name: c.vector_field.clone(),
                    data_type: DataType::FloatVector,
                    primary_key: false,
                    dim: Some(c.dim),
                },
            ],
            shards_num: c.shards_num,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub field: String,
    pub index_type: String,
    pub metric: MetricType,
    pub nlist: Option<u32>,
}

impl IndexSpec {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            field: config.collection.vector_field.clone(),
            index_type: config.index.index_type.clone(),
            metric: config.index.metric,
            nlist: config.index.nlist,
        }
    }
}

/// Column names for insert payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNames {
    pub pk: String,
    pub scalar: String,
    pub vector: String,
}

impl FieldNames {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            pk: config.collection.pk_field.clone(),
            scalar: config.collection.scalar_field.clone(),
            vector: config.collection.vector_field.clone(),
        }
    }
}

/// A similarity search against one collection.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub collection: &'a str,
    pub partitions: &'a [String],
    pub filter: &'a str,
    pub output_fields: &'a [String],
    pub vectors: &'a [Vec<f32>],
    pub vector_field: &'a str,
    pub metric: MetricType,
    pub top_k: usize,
    pub nprobe: u32,
}
