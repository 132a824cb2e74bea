//! [`MetricEvaluator`] backed by the `elinor` crate.
//!
//! Covers `map`, `recip_rank`, `Rprec`, `bpref`, `ndcg_cut_N`, `P_N` and
//! `recall_N`. The interpolated-precision levels are not computed and so
//! never appear in per-query results.

use super::{MetricEvaluator, PerQueryScores, Qrels, Run};
use crate::error::{BenchError, Result};
use elinor::{Metric, PredRelStoreBuilder, TrueRelStoreBuilder};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct ElinorEvaluator;

/// Map a trec_eval metric name onto an elinor metric (k = 0 means no cutoff).
pub fn to_elinor_metric(name: &str) -> Option<Metric> {
    let cutoff = |prefix: &str| name.strip_prefix(prefix).and_then(|k| k.parse::<usize>().ok());
    match name {
        "map" => Some(Metric::AP { k: 0 }),
        "recip_rank" => Some(Metric::RR { k: 0 }),
        "Rprec" => Some(Metric::RPrecision),
        "bpref" => Some(Metric::Bpref),
        _ => {
            if let Some(k) = cutoff("ndcg_cut_") {
                Some(Metric::NDCG { k })
            } else if let Some(k) = cutoff("P_") {
                Some(Metric::Precision { k })
            } else {
                cutoff("recall_").map(|k| Metric::Recall { k })
            }
        }
    }
}

fn evaluator_err(e: impl std::fmt::Display) -> BenchError {
    BenchError::Evaluator(e.to_string())
}

impl MetricEvaluator for ElinorEvaluator {
    fn evaluate(&self, qrels: &Qrels, run: &Run, metrics: &[&str]) -> Result<PerQueryScores> {
        // Only queries that are judged and actually retrieved something are scored.
        let scope: BTreeSet<&String> = run
            .iter()
            .filter(|(q, hits)| !hits.is_empty() && qrels.get(*q).is_some_and(|r| !r.is_empty()))
            .map(|(q, _)| q)
            .collect();
        let mut out = PerQueryScores::new();
        if scope.is_empty() {
            return Ok(out);
        }

        let mut true_builder = TrueRelStoreBuilder::new();
        let mut pred_builder = PredRelStoreBuilder::new();
        for &qid in &scope {
            for (doc_no, &rel) in &qrels[qid] {
                true_builder.add_record(qid.clone(), doc_no.clone(), rel).map_err(evaluator_err)?;
            }
            for (doc_no, &score) in &run[qid] {
                pred_builder.add_record(qid.clone(), doc_no.clone(), score.into()).map_err(evaluator_err)?;
            }
        }
        let true_rels = true_builder.build();
        let pred_rels = pred_builder.build();

        for &name in metrics {
            let Some(metric) = to_elinor_metric(name) else {
                tracing::debug!(metric = name, "metric not supported by elinor backend");
                continue;
            };
            let evaluated = elinor::evaluate(&true_rels, &pred_rels, metric).map_err(evaluator_err)?;
            for (qid, value) in evaluated.scores().iter() {
                out.entry(qid.to_string()).or_default().insert(name.to_string(), *value);
            }
        }
        Ok(out)
    }
}
