//! Evaluation of a retrieval run against linked ground truth.
//!
//! Per-query metric values come from a [`MetricEvaluator`]; this module
//! builds its qrels/run inputs and reduces its output to corpus-level means.
//!
//! A query contributes to the mean of a metric only if its per-query result
//! carries that metric. Queries missing from the run carry nothing and are
//! excluded, never counted as zero.

pub mod catalog;
pub mod elinor_backend;

pub use catalog::{describe, metric_names, METRIC_CATALOG};
pub use elinor_backend::ElinorEvaluator;

use crate::error::{BenchError, Result};
use crate::model::{DocNo, Query, QueryNo, RankedResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// `query_no -> doc_no -> relevance`.
pub type Qrels = BTreeMap<QueryNo, BTreeMap<DocNo, u32>>;
/// `query_no -> doc_no -> score`.
pub type Run = BTreeMap<QueryNo, BTreeMap<DocNo, f64>>;
/// `query_no -> metric -> value`.
pub type PerQueryScores = BTreeMap<QueryNo, BTreeMap<String, f64>>;

/// The statistical engine computing per-query metric values.
pub trait MetricEvaluator {
    fn evaluate(&self, qrels: &Qrels, run: &Run, metrics: &[&str]) -> Result<PerQueryScores>;
}

/// Binary qrels for every query with at least one relevant document.
/// Unlisted documents are implicitly non-relevant.
pub fn build_qrels(queries: &[Query]) -> Qrels {
    queries
        .iter()
        .filter(|q| !q.relevant_docs.is_empty())
        .map(|q| (q.query_no.clone(), q.relevant_docs.iter().map(|d| (d.clone(), 1)).collect()))
        .collect()
}

pub fn build_run(results: &[RankedResult]) -> Run {
    results
        .iter()
        .map(|r| (r.query_no.clone(), r.hits.iter().map(|(d, s)| (d.clone(), f64::from(*s))).collect()))
        .collect()
}

/// Mean of each metric over the queries reporting it. Metric names are the
/// union over all queries.
pub fn aggregate(per_query: &PerQueryScores) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for metrics in per_query.values() {
        for (name, value) in metrics {
            let slot = sums.entry(name.as_str()).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }
    sums.into_iter().map(|(name, (sum, n))| (name.to_string(), sum / n as f64)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub per_query_scores: PerQueryScores,
    pub average_scores: BTreeMap<String, f64>,
    pub metric_descriptions: BTreeMap<String, String>,
    pub num_queries_judged: usize,
    pub num_queries_evaluated: usize,
}

impl EvaluationReport {
    /// Fixed-width table of mean scores, catalog metrics first.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<40} {:<10}", "Metric", "Average Score");
        let _ = writeln!(out, "{}", "=".repeat(50));
        let catalog_first = METRIC_CATALOG
            .iter()
            .map(|(name, _)| *name)
            .chain(self.average_scores.keys().map(String::as_str).filter(|n| describe(n).is_none()));
        for name in catalog_first {
            if let Some(value) = self.average_scores.get(name) {
                let label = self.metric_descriptions.get(name).map(String::as_str).unwrap_or(name);
                let _ = writeln!(out, "{label:<40} {value:.4}");
            }
        }
        out
    }
}

/// Score `results` against the relevant documents of `queries`.
///
/// Fails when no query has a relevant document or the run is empty.
pub fn evaluate_run<E: MetricEvaluator + ?Sized>(
    evaluator: &E,
    results: &[RankedResult],
    queries: &[Query],
    metrics: &[&str],
) -> Result<EvaluationReport> {
    let qrels = build_qrels(queries);
    if qrels.is_empty() {
        return Err(BenchError::EmptyEvaluationInput("no query has a relevant document"));
    }
    let run = build_run(results);
    if run.is_empty() {
        return Err(BenchError::EmptyEvaluationInput("run contains no queries"));
    }

    let mut per_query = evaluator.evaluate(&qrels, &run, metrics)?;
    per_query.retain(|q, _| run.contains_key(q) && qrels.contains_key(q));
    let average_scores = aggregate(&per_query);

    for name in metrics {
        if !average_scores.contains_key(*name) {
            tracing::warn!(metric = *name, "no query reported this metric");
        }
    }
    let metric_descriptions = average_scores
        .keys()
        .map(|name| (name.clone(), describe(name).unwrap_or(name.as_str()).to_string()))
        .collect();
    tracing::info!(judged = qrels.len(), evaluated = per_query.len(), "run evaluated");

    Ok(EvaluationReport {
        num_queries_judged: qrels.len(),
        num_queries_evaluated: per_query.len(),
        per_query_scores: per_query,
        average_scores,
        metric_descriptions,
    })
}
