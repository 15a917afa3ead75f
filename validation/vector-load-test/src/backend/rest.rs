//! Milvus RESTful v2 client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    BackendResult, CollectionSchema, DataType, FieldNames, IndexSpec, SearchRequest,
    VectorBackend,
};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::workload::InsertBatch;

/// Response wrapper returned by every `/v2/vectordb` endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn into_result(self) -> BackendResult<Value> {
        // Older servers report success as 200
        if self.code == 0 || self.code == 200 {
            Ok(self.data)
        } else {
            Err(BackendError::rejected(self.code, self.message))
        }
    }
}

/// Backend reached over the Milvus REST API.
///
/// `reqwest::Client` pools connections internally and is cheap to share,
/// so one instance serves every concurrent invocation.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestBackend {
    /// Create a new client for the configured address.
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_address(&config.address),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: Value) -> BackendResult<Value> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Transport(format!(
                "{} returned HTTP {}: {}",
                path, status, text
            )));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("{}: {}", path, e)))?;
        envelope.into_result()
    }
}

/// Prefix bare `host:port` addresses with http://.
fn normalize_address(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn data_type_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int64 => "Int64",
        DataType::Double => "Double",
        DataType::FloatVector => "FloatVector",
    }
}

fn create_collection_body(schema: &CollectionSchema) -> Value {
    let fields: Vec<Value> = schema
        .fields
        .iter()
        .map(|f| {
            let mut field = json!({
                "fieldName": f.name,
                "dataType": data_type_name(f.data_type),
                "isPrimary": f.primary_key,
            });
            if let Some(dim) = f.dim {
                field["elementTypeParams"] = json!({ "dim": dim.to_string() });
            }
            field
        })
        .collect();

    json!({
        "collectionName": schema.name,
        "schema": {
            "autoId": false,
            "enableDynamicField": false,
            "fields": fields,
        },
        "params": { "shardsNum": schema.shards_num },
    })
}

fn create_index_body(collection: &str, index: &IndexSpec) -> Value {
    let mut params = Map::new();
    params.insert("index_type".to_string(), json!(index.index_type));
    if let Some(nlist) = index.nlist {
        params.insert("nlist".to_string(), json!(nlist));
    }
    json!({
        "collectionName": collection,
        "indexParams": [{
            "fieldName": index.field,
            "indexName": format!("{}_idx", index.field),
            "metricType": index.metric.as_str(),
            "params": params,
        }],
    })
}

/// Rows are sent as objects keyed by field name.
fn insert_body(collection: &str, partition: &str, fields: &FieldNames, batch: &InsertBatch) -> Value {
    let rows: Vec<Value> = batch
        .primary_keys
        .iter()
        .zip(&batch.scalars)
        .zip(&batch.vectors)
        .map(|((pk, scalar), vector)| {
            let mut row = Map::with_capacity(3);
            row.insert(fields.pk.clone(), json!(pk));
            row.insert(fields.scalar.clone(), json!(scalar));
            row.insert(fields.vector.clone(), json!(vector));
            Value::Object(row)
        })
        .collect();

    json!({
        "collectionName": collection,
        "partitionName": partition,
        "data": rows,
    })
}

fn search_body(request: &SearchRequest<'_>) -> Value {
    json!({
        "collectionName": request.collection,
        "partitionNames": request.partitions,
        "data": request.vectors,
        "annsField": request.vector_field,
        "filter": request.filter,
        "limit": request.top_k,
        "outputFields": request.output_fields,
        "searchParams": {
            "metricType": request.metric.as_str(),
            "params": { "nprobe": request.nprobe },
        },
    })
}

#[async_trait]
impl VectorBackend for RestBackend {
    async fn has_collection(&self, collection: &str) -> BackendResult<bool> {
        let data = self
            .post("collections/has", json!({ "collectionName": collection }))
            .await?;
        data["has"]
            .as_bool()
            .ok_or_else(|| BackendError::Decode("collections/has: missing 'has' flag".to_string()))
    }

    async fn drop_collection(&self, collection: &str) -> BackendResult<()> {
        self.post("collections/drop", json!({ "collectionName": collection }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, schema), fields(collection = %schema.name))]
    async fn create_collection(&self, schema: &CollectionSchema) -> BackendResult<()> {
        self.post("collections/create", create_collection_body(schema))
            .await?;
        Ok(())
    }

    async fn create_partition(&self, collection: &str, partition: &str) -> BackendResult<()> {
        self.post(
            "partitions/create",
            json!({ "collectionName": collection, "partitionName": partition }),
        )
        .await?;
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> BackendResult<()> {
        self.post("indexes/create", create_index_body(collection, index))
            .await?;
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> BackendResult<()> {
        self.post("collections/load", json!({ "collectionName": collection }))
            .await?;
        Ok(())
    }

    async fn insert(
        &self,
        collection: &str,
        partition: &str,
        fields: &FieldNames,
        batch: &InsertBatch,
    ) -> BackendResult<u64> {
        let data = self
            .post("entities/insert", insert_body(collection, partition, fields, batch))
            .await?;
        let count = data["insertCount"].as_u64().unwrap_or(batch.len() as u64);
        debug!(rows = count, "insert acknowledged");
        Ok(count)
    }

    async fn search(&self, request: &SearchRequest<'_>) -> BackendResult<usize> {
        let data = self.post("entities/search", search_body(request)).await?;
        Ok(data.as_array().map(Vec::len).unwrap_or(0))
    }
}
