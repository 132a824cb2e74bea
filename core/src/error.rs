//! Fatal error conditions for the benchmark pipeline.
//!
//! Per-line and per-file defects never surface here; they are logged and
//! skipped by the stage that meets them. Only structural preconditions that
//! would make the benchmark statistically invalid abort a stage.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// None of the judgment paths could be opened as a regular file.
    #[error("no valid relevance input: none of the {attempted} judgment paths was a readable file")]
    NoValidRelevanceInput { attempted: usize },

    #[error("insufficient eligible queries: need {need}, found {found} with at least {min_relevant} relevant documents")]
    InsufficientEligibleQueries { need: usize, found: usize, min_relevant: usize },

    #[error("embedding dimension mismatch for {id}: expected {expected}, got {actual}")]
    DimensionMismatch { id: String, expected: usize, actual: usize },

    #[error("empty evaluation input: {0}")]
    EmptyEvaluationInput(&'static str),

    #[error("metric evaluator failed: {0}")]
    Evaluator(String),

    #[error("embedder failed for {id}: {reason}")]
    Embedding { id: String, reason: String },

    #[error("malformed {kind} at {path}:{line}")]
    Malformed { kind: &'static str, path: PathBuf, line: usize },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BenchError::Io { path: path.into(), source }
    }
}
