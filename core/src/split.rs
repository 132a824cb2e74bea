//! Deterministic train/test partitioning of linked queries, plus
//! attachment of negative evidence.
//!
//! All randomness comes from `ChaCha8Rng` seeded with an explicit value, so
//! a given seed produces the same split on every platform.

use crate::error::{BenchError, Result};
use crate::model::{DocNo, Document, Query, QueryNo, Split};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_size: usize,
    pub min_relevant_docs: usize,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { test_size: 50, min_relevant_docs: 5, seed: DEFAULT_SEED }
    }
}

/// Partition `queries` into train and test.
///
/// The test set is a seeded sample of `test_size` queries having at least
/// `min_relevant_docs` relevant documents. Eligible queries are ordered by
/// `query_no` before sampling, so the selection does not depend on the order
/// of the input. Train is every input query whose `query_no` was not selected.
pub fn split_queries(queries: Vec<Query>, config: &SplitConfig) -> Result<Split> {
    let mut eligible: Vec<&Query> =
        queries.iter().filter(|q| q.num_relevant() >= config.min_relevant_docs).collect();
    tracing::info!(
        total = queries.len(),
        eligible = eligible.len(),
        min_relevant = config.min_relevant_docs,
        "eligible queries for test split"
    );
    if eligible.len() < config.test_size {
        return Err(BenchError::InsufficientEligibleQueries {
            need: config.test_size,
            found: eligible.len(),
            min_relevant: config.min_relevant_docs,
        });
    }
    eligible.sort_by(|a, b| a.query_no.cmp(&b.query_no));

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let selected: HashSet<QueryNo> = eligible
        .choose_multiple(&mut rng, config.test_size)
        .map(|q| q.query_no.clone())
        .collect();

    let mut split = Split::default();
    let mut placed: HashSet<QueryNo> = HashSet::with_capacity(selected.len());
    for query in queries {
        if !selected.contains(&query.query_no) {
            split.train.push(query);
        } else if placed.insert(query.query_no.clone()) {
            split.test.push(query);
        } else {
            tracing::warn!(query_no = %query.query_no, "duplicate query id dropped from test split");
        }
    }
    Ok(split)
}

/// Sizes and test-set relevance statistics of a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub train: usize,
    pub test: usize,
    pub test_min_relevant: usize,
    pub test_max_relevant: usize,
    pub test_mean_relevant: f64,
}

impl SplitSummary {
    pub fn of(split: &Split) -> Self {
        let counts: Vec<usize> = split.test.iter().map(Query::num_relevant).collect();
        let mean = if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<usize>() as f64 / counts.len() as f64
        };
        Self {
            train: split.train.len(),
            test: split.test.len(),
            test_min_relevant: counts.iter().copied().min().unwrap_or(0),
            test_max_relevant: counts.iter().copied().max().unwrap_or(0),
            test_mean_relevant: mean,
        }
    }
}

/// How negatives are attached to queries that have no explicit evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegativePolicy {
    /// Upper bound on sampled negatives per query; 0 disables sampling.
    pub per_query: usize,
    pub seed: u64,
}

impl Default for NegativePolicy {
    fn default() -> Self {
        Self { per_query: 100, seed: DEFAULT_SEED }
    }
}

impl NegativePolicy {
    pub fn explicit_only() -> Self {
        Self { per_query: 0, seed: DEFAULT_SEED }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegativeStats {
    pub explicit: usize,
    pub sampled: usize,
    pub without: usize,
}

/// Documents eligible as negatives: those with a non-empty passage, sorted
/// and deduplicated. These are exactly the rows of the collection export.
pub fn negative_pool(docs: &[Document]) -> Vec<&str> {
    let mut pool: Vec<&str> =
        docs.iter().filter(|d| !d.passage().is_empty()).map(|d| d.doc_no.as_str()).collect();
    pool.sort_unstable();
    pool.dedup();
    pool
}

/// Attach `non_relevant_docs` to each query.
///
/// Precedence: negatives already on the query, then `explicit` evidence
/// (minus anything judged relevant or outside `pool`), then a seeded sample
/// from `pool` outside the query's relevant set. `pool` must be sorted, as
/// returned by [`negative_pool`]. Queries with no relevant documents never
/// receive sampled negatives. One RNG stream is consumed in query order.
pub fn attach_negatives(
    queries: &mut [Query],
    explicit: &BTreeMap<QueryNo, Vec<DocNo>>,
    pool: &[&str],
    policy: &NegativePolicy,
) -> NegativeStats {
    let mut stats = NegativeStats::default();
    let mut rng = ChaCha8Rng::seed_from_u64(policy.seed);

    for query in queries.iter_mut() {
        if query.non_relevant_docs.is_some() {
            stats.explicit += 1;
            continue;
        }
        let relevant: HashSet<&str> = query.relevant_docs.iter().map(String::as_str).collect();

        if let Some(judged) = explicit.get(&query.query_no) {
            let negs: Vec<DocNo> = judged
                .iter()
                .filter(|d| !relevant.contains(d.as_str()) && pool.binary_search(&d.as_str()).is_ok())
                .cloned()
                .collect();
            if !negs.is_empty() {
                query.non_relevant_docs = Some(negs);
                stats.explicit += 1;
                continue;
            }
        }

        if policy.per_query == 0 || relevant.is_empty() {
            stats.without += 1;
            continue;
        }
        let candidates: Vec<&str> = pool.iter().copied().filter(|d| !relevant.contains(d)).collect();
        let amount = policy.per_query.min(candidates.len());
        let sampled: Vec<DocNo> = candidates.choose_multiple(&mut rng, amount).map(|d| d.to_string()).collect();
        tracing::debug!(query_no = %query.query_no, sampled = sampled.len(), "sampled fallback negatives");
        query.non_relevant_docs = Some(sampled);
        stats.sampled += 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(no: &str, rel: usize) -> Query {
        let mut q = Query::new(no, format!("topic {no}"));
        for i in 0..rel {
            q.add_relevant_doc(format!("D{no}-{i}"));
        }
        q
    }

    fn collection() -> Vec<Query> {
        (0..20).map(|i| query(&format!("{}", 300 + i), i % 7)).collect()
    }

    fn ids(qs: &[Query]) -> Vec<String> {
        let mut v: Vec<String> = qs.iter().map(|q| q.query_no.clone()).collect();
        v.sort();
        v
    }

    #[test]
    fn partitions_are_disjoint_and_cover_input() {
        let input = collection();
        let all = ids(&input);
        let cfg = SplitConfig { test_size: 4, min_relevant_docs: 3, seed: 7 };
        let split = split_queries(input, &cfg).unwrap();
        assert_eq!(split.test.len(), 4);
        assert!(split.test.iter().all(|q| q.num_relevant() >= 3));
        let train: HashSet<String> = ids(&split.train).into_iter().collect();
        assert!(split.test.iter().all(|q| !train.contains(&q.query_no)));
        let mut union = ids(&split.train);
        union.extend(ids(&split.test));
        union.sort();
        assert_eq!(union, all);
    }

    #[test]
    fn selection_ignores_input_order() {
        let cfg = SplitConfig { test_size: 5, min_relevant_docs: 2, seed: DEFAULT_SEED };
        let forward = split_queries(collection(), &cfg).unwrap();
        let mut reversed_input = collection();
        reversed_input.reverse();
        let reversed = split_queries(reversed_input, &cfg).unwrap();
        assert_eq!(ids(&forward.test), ids(&reversed.test));
        let again = split_queries(collection(), &cfg).unwrap();
        assert_eq!(ids(&forward.test), ids(&again.test));
    }

    #[test]
    fn too_few_eligible_is_fatal() {
        let cfg = SplitConfig { test_size: 10, min_relevant_docs: 6, seed: 1 };
        let err = split_queries(collection(), &cfg).unwrap_err();
        match err {
            BenchError::InsufficientEligibleQueries { need, found, .. } => {
                assert_eq!(need, 10);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn summary_reports_test_relevance() {
        let cfg = SplitConfig { test_size: 2, min_relevant_docs: 6, seed: 1 };
        let split = split_queries(collection(), &cfg).unwrap();
        let summary = SplitSummary::of(&split);
        assert_eq!(summary.test, 2);
        assert_eq!(summary.train, 18);
        assert_eq!(summary.test_min_relevant, 6);
        assert_eq!(summary.test_max_relevant, 6);
    }

    fn sorted_refs(ids: &[String]) -> Vec<&str> {
        let mut v: Vec<&str> = ids.iter().map(String::as_str).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn negatives_follow_precedence_and_are_deterministic() {
        let ids: Vec<String> = (0..50).map(|i| format!("N{i:02}")).chain(["D1-0".to_string()]).collect();
        let pool = sorted_refs(&ids);
        let mut explicit = BTreeMap::new();
        explicit.insert("1".to_string(), vec!["N03".to_string(), "D1-0".to_string(), "GONE".to_string()]);

        let make = || vec![query("1", 1), query("2", 1), query("3", 0)];
        let policy = NegativePolicy { per_query: 10, seed: 3 };

        let mut a = make();
        let stats = attach_negatives(&mut a, &explicit, &pool, &policy);
        assert_eq!(stats, NegativeStats { explicit: 1, sampled: 1, without: 1 });
        assert_eq!(a[0].non_relevant_docs, Some(vec!["N03".to_string()]));
        let sampled = a[1].non_relevant_docs.clone().unwrap();
        assert_eq!(sampled.len(), 10);
        assert!(!sampled.contains(&"D2-0".to_string()));
        assert_eq!(a[2].non_relevant_docs, None);

        let mut b = make();
        attach_negatives(&mut b, &explicit, &pool, &policy);
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_only_policy_never_samples() {
        let mut qs = vec![query("1", 1)];
        let stats = attach_negatives(&mut qs, &BTreeMap::new(), &["A", "B"], &NegativePolicy::explicit_only());
        assert_eq!(stats.without, 1);
        assert!(qs[0].non_relevant_docs.is_none());
    }

    #[test]
    fn documents_without_passage_are_never_negatives() {
        let doc = |no: &str, text: Option<&str>| Document {
            doc_no: no.to_string(),
            text: text.map(String::from),
            ..Default::default()
        };
        let docs = vec![doc("A", Some("alpha")), doc("EMPTY", None), doc("C", Some("gamma")), doc("B", Some("  "))];
        let pool = negative_pool(&docs);
        assert_eq!(pool, vec!["A", "C"]);

        let mut q = Query::new("1", "topic");
        q.add_relevant_doc("A");
        let mut qs = vec![q];
        let mut judged = BTreeMap::new();
        judged.insert("2".to_string(), vec!["EMPTY".to_string()]);
        attach_negatives(&mut qs, &judged, &pool, &NegativePolicy { per_query: 10, seed: 42 });
        assert_eq!(qs[0].non_relevant_docs, Some(vec!["C".to_string()]));

        let mut only_empty = vec![Query::new("2", "other")];
        only_empty[0].add_relevant_doc("A");
        attach_negatives(&mut only_empty, &judged, &pool, &NegativePolicy::explicit_only());
        assert_eq!(only_empty[0].non_relevant_docs, None);
    }
}
