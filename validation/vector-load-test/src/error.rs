//! Error types for the load harness.

use std::path::PathBuf;

use thiserror::Error;

use crate::workload::OperationClass;

/// Result type alias using HarnessError.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Failure of a single call against the vector backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network or HTTP level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered but rejected the request.
    #[error("backend rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The call exceeded its per-invocation deadline.
    #[error("call exceeded deadline of {0}ms")]
    Timeout(u64),

    /// The response body could not be understood.
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Create a Rejected error.
    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Fatal errors that end a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Scenario file could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// One-time collection preparation failed before measurement began.
    #[error("setup failed during {step}: {source}")]
    Setup {
        step: &'static str,
        #[source]
        source: BackendError,
    },

    /// A measured operation failed.
    #[error("{class} operation failed in round {round}: {source}")]
    Backend {
        class: OperationClass,
        round: u64,
        #[source]
        source: BackendError,
    },

    /// Writing results to disk failed.
    #[error("failed to export results to {}: {source}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A spawned invocation panicked or was cancelled.
    #[error("invocation task in round {round} did not complete: {message}")]
    TaskJoin { round: u64, message: String },
}

impl HarnessError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Setup error for the named step.
    pub fn setup(step: &'static str, source: BackendError) -> Self {
        Self::Setup { step, source }
    }

    /// Create an Export error for the given destination.
    pub fn export(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Export {
            path: path.into(),
            source,
        }
    }

    /// Round index attached to this error, if it happened during the measured run.
    pub fn round(&self) -> Option<u64> {
        match self {
            Self::Backend { round, .. } | Self::TaskJoin { round, .. } => Some(*round),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for HarnessError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
