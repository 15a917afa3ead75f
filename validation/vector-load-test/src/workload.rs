//! Work units and the argument generators that feed them.

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of operation issued against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Write,
    Query,
}

impl OperationClass {
    pub const ALL: [OperationClass; 2] = [OperationClass::Write, OperationClass::Query];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Write => "write",
            OperationClass::Query => "query",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column-oriented rows for one insert call.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBatch {
    pub primary_keys: Vec<i64>,
    pub scalars: Vec<f64>,
    pub vectors: Vec<Vec<f32>>,
}

impl InsertBatch {
    pub fn len(&self) -> usize {
        self.primary_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary_keys.is_empty()
    }
}

/// One scheduled invocation and its arguments. Consumed by exactly one executor.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    Write {
        iteration: u64,
        batch: InsertBatch,
    },
    Query {
        vectors: Arc<Vec<Vec<f32>>>,
    },
}

impl WorkUnit {
    pub fn class(&self) -> OperationClass {
        match self {
            WorkUnit::Write { .. } => OperationClass::Write,
            WorkUnit::Query { .. } => OperationClass::Query,
        }
    }
}

/// Produces insert payloads and query vectors.
///
/// Holds no mutable state: randomness comes from an RNG derived per work
/// unit, so the output for a given unit sequence number is reproducible
/// under a fixed seed no matter how tasks interleave.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    seed: Option<u64>,
    dim: usize,
    rows_per_insert: usize,
}

impl WorkloadGenerator {
    pub fn new(seed: Option<u64>, dim: usize, rows_per_insert: usize) -> Self {
        Self {
            seed,
            dim,
            rows_per_insert,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows_per_insert(&self) -> usize {
        self.rows_per_insert
    }

    /// RNG for the given stream. Seeded runs mix the stream id into the seed,
    /// unseeded runs draw from entropy.
    pub fn rng_for(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(mix(seed, stream)),
            None => StdRng::from_entropy(),
        }
    }

    /// Contiguous identifier block owned by `iteration`.
    ///
    /// Blocks for distinct iterations never overlap.
    pub fn primary_keys(iteration: u64, rows: usize) -> Vec<i64> {
        let start = iteration as i64 * rows as i64;
        (start..start + rows as i64).collect()
    }

    pub fn scalar_values<R: Rng>(rng: &mut R, rows: usize) -> Vec<f64> {
        (0..rows).map(|_| rng.gen::<f64>()).collect()
    }

    pub fn float_vectors<R: Rng>(rng: &mut R, rows: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..rows)
            .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
            .collect()
    }

    /// Build the full insert batch for a write iteration.
    pub fn insert_batch<R: Rng>(&self, rng: &mut R, iteration: u64) -> InsertBatch {
        InsertBatch {
            primary_keys: Self::primary_keys(iteration, self.rows_per_insert),
            scalars: Self::scalar_values(rng, self.rows_per_insert),
            vectors: Self::float_vectors(rng, self.rows_per_insert, self.dim),
        }
    }

    pub fn query_vectors<R: Rng>(&self, rng: &mut R, nq: usize) -> Vec<Vec<f32>> {
        Self::float_vectors(rng, nq, self.dim)
    }
}

// splitmix64 finalizer
fn mix(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
