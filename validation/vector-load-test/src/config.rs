//! Scenario configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};
use crate::workload::OperationClass;

/// Main run configuration loaded from YAML.
///
/// Every section has defaults, so an empty document describes the stock
/// random insert/search mix against a local Milvus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// How to reach the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_address")]
    pub address: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,
    /// Per-invocation deadline for measured calls; none means wait forever
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Collection layout used by the workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_collection")]
    pub name: String,
    #[serde(default = "default_partition")]
    pub partition: String,
    #[serde(default = "default_pk_field")]
    pub pk_field: String,
    #[serde(default = "default_scalar_field")]
    pub scalar_field: String,
    #[serde(default = "default_vector_field")]
    pub vector_field: String,
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default = "default_shards")]
    pub shards_num: u32,
    /// Drop and recreate the collection before the run
    #[serde(default = "default_true")]
    pub recreate: bool,
}

/// Index built on the vector field during setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_type")]
    pub index_type: String,
    #[serde(default)]
    pub metric: MetricType,
    /// Neighbor-list count for IVF indexes
    #[serde(default)]
    pub nlist: Option<u32>,
}

/// Similarity search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of query vectors per search
    #[serde(default = "default_nq")]
    pub nq: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_nprobe")]
    pub nprobe: u32,
    /// Filter expression; defaults to `<pk_field> >= 0`
    #[serde(default)]
    pub filter: Option<String>,
    /// Generate fresh query vectors per search instead of one fixed batch
    #[serde(default)]
    pub refresh_vectors: bool,
}

/// Round structure and operation mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_total_rounds")]
    pub total_rounds: u64,
    #[serde(default = "default_units_per_round")]
    pub units_per_round: usize,
    /// Rows sent by each insert
    #[serde(default = "default_rows_per_insert")]
    pub rows_per_insert: usize,
    /// Unmeasured inserts issued before the first round
    #[serde(default = "default_preload")]
    pub preload_batches: u64,
    #[serde(default)]
    pub selection: ClassSelection,
    #[serde(default)]
    pub latency_recording: LatencyRecording,
    /// Optional RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

/// How the operation class is picked for each invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassSelection {
    /// Independent coin flip per invocation
    Random {
        #[serde(default = "default_write_ratio")]
        write_ratio: f64,
    },
    /// Every invocation uses the same class
    Always { class: OperationClass },
}

impl Default for ClassSelection {
    fn default() -> Self {
        ClassSelection::Random {
            write_ratio: default_write_ratio(),
        }
    }
}

/// Whether a failed call still contributes a latency sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyRecording {
    #[default]
    Always,
    SuccessOnly,
}

/// Distance metric for index and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricType {
    #[default]
    L2,
    #[serde(rename = "IP")]
    Ip,
    #[serde(rename = "COSINE")]
    Cosine,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
        }
    }
}

/// Where samples are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_insert_file")]
    pub insert_file: String,
    #[serde(default = "default_search_file")]
    pub search_file: String,
    /// Also write summary.json next to the sample files
    #[serde(default)]
    pub write_summary: bool,
}

impl OutputConfig {
    /// Destination file for the given series.
    pub fn path_for(&self, class: OperationClass) -> PathBuf {
        match class {
            OperationClass::Write => self.dir.join(&self.insert_file),
            OperationClass::Query => self.dir.join(&self.search_file),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join("summary.json")
    }
}

fn default_name() -> String {
    "random-mix".to_string()
}
fn default_address() -> String {
    "http://localhost:19530".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_collection() -> String {
    "test_go_random_locust".to_string()
}
fn default_partition() -> String {
    "default".to_string()
}
fn default_pk_field() -> String {
    "pk".to_string()
}
fn default_scalar_field() -> String {
    "random".to_string()
}
fn default_vector_field() -> String {
    "embeddings".to_string()
}
fn default_dim() -> usize {
    128
}
fn default_shards() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_index_type() -> String {
    "FLAT".to_string()
}
fn default_nq() -> usize {
    10
}
fn default_top_k() -> usize {
    10
}
fn default_nprobe() -> u32 {
    20
}
fn default_total_rounds() -> u64 {
    400
}
fn default_units_per_round() -> usize {
    12
}
fn default_rows_per_insert() -> usize {
    500
}
fn default_preload() -> u64 {
    1
}
fn default_write_ratio() -> f64 {
    0.5
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}
fn default_insert_file() -> String {
    "insert.txt".to_string()
}
fn default_search_file() -> String {
    "search.txt".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            token: None,
            call_timeout_ms: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection(),
            partition: default_partition(),
            pk_field: default_pk_field(),
            scalar_field: default_scalar_field(),
            vector_field: default_vector_field(),
            dim: default_dim(),
            shards_num: default_shards(),
            recreate: true,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_type: default_index_type(),
            metric: MetricType::default(),
            nlist: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            nq: default_nq(),
            top_k: default_top_k(),
            nprobe: default_nprobe(),
            filter: None,
            refresh_vectors: false,
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            total_rounds: default_total_rounds(),
            units_per_round: default_units_per_round(),
            rows_per_insert: default_rows_per_insert(),
            preload_batches: default_preload(),
            selection: ClassSelection::default(),
            latency_recording: LatencyRecording::default(),
            seed: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            insert_file: default_insert_file(),
            search_file: default_search_file(),
            write_summary: false,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: String::new(),
            backend: BackendConfig::default(),
            collection: CollectionConfig::default(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            workload: WorkloadConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.backend.address.trim().is_empty() {
            return Err(HarnessError::config("backend.address must not be empty"));
        }
        if self.collection.dim == 0 {
            return Err(HarnessError::config("collection.dim must be > 0"));
        }
        if self.workload.rows_per_insert == 0 {
            return Err(HarnessError::config("workload.rows_per_insert must be > 0"));
        }
        if self.search.nq == 0 {
            return Err(HarnessError::config("search.nq must be > 0"));
        }
        if self.search.top_k == 0 {
            return Err(HarnessError::config("search.top_k must be > 0"));
        }
        if let ClassSelection::Random { write_ratio } = self.workload.selection {
            if !(0.0..=1.0).contains(&write_ratio) {
                return Err(HarnessError::config(format!(
                    "workload.selection.write_ratio must be within [0, 1], got {}",
                    write_ratio
                )));
            }
        }
        if self.backend.call_timeout_ms == Some(0) {
            return Err(HarnessError::config("backend.call_timeout_ms must be > 0 when set"));
        }
        Ok(())
    }

    /// Filter expression sent with every search.
    pub fn search_filter(&self) -> String {
        self.search
            .filter
            .clone()
            .unwrap_or_else(|| format!("{} >= 0", self.collection.pk_field))
    }
}
