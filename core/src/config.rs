//! Run configuration: JSON file, then environment, then CLI flags.

use crate::error::{BenchError, Result};
use crate::evaluation::metric_names;
use crate::index::Bm25Params;
use crate::split::{NegativePolicy, SplitConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Overrides both the split seed and the negative-sampling seed.
pub const SEED_ENV: &str = "FTBENCH_SEED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub split: SplitConfig,
    pub negatives: NegativePolicy,
    /// Use `relevance == 0` judgments as explicit negatives before sampling.
    pub judged_negatives: bool,
    pub top_k: usize,
    pub metrics: Vec<String>,
    pub bm25: Bm25Params,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            negatives: NegativePolicy::default(),
            judged_negatives: false,
            top_k: 1000,
            metrics: metric_names().into_iter().map(String::from).collect(),
            bm25: Bm25Params::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `load` when a path is given, defaults otherwise; env overrides applied.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(SEED_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(seed) => self.set_seed(seed),
                Err(_) => tracing::warn!(value = %raw, "ignoring non-numeric {}", SEED_ENV),
            }
        }
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.split.seed = seed;
        self.negatives.seed = seed;
    }

    pub fn metric_refs(&self) -> Vec<&str> {
        self.metrics.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.split.test_size, 50);
        assert_eq!(cfg.split.min_relevant_docs, 5);
        assert_eq!(cfg.split.seed, 42);
        assert_eq!(cfg.negatives.per_query, 100);
        assert_eq!(cfg.top_k, 1000);
        assert_eq!(cfg.metrics.len(), 23);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"top_k": 10, "split": {"test_size": 3, "min_relevant_docs": 1, "seed": 9}}"#).unwrap();
        assert_eq!(cfg.top_k, 10);
        assert_eq!(cfg.split.test_size, 3);
        assert_eq!(cfg.negatives.per_query, 100);
        assert_eq!(cfg.bm25, Bm25Params::default());
    }

    #[test]
    fn bm25_parameters_are_configurable() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"bm25": {"k1": 0.9}}"#).unwrap();
        assert_eq!(cfg.bm25, Bm25Params { k1: 0.9, b: 0.75 });
    }

    #[test]
    fn set_seed_updates_both_samplers() {
        let mut cfg = PipelineConfig::default();
        cfg.set_seed(7);
        assert_eq!(cfg.split.seed, 7);
        assert_eq!(cfg.negatives.seed, 7);
    }
}
