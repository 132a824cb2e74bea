//! Dense retrieval over precomputed embeddings.
//!
//! The embedding model and the vector index are collaborators behind the
//! [`Embedder`] and [`VectorIndex`] traits. [`FlatIpIndex`] is an exact
//! brute-force inner-product index; with unit-norm inputs its scores are
//! cosine similarities.

use crate::error::{BenchError, Result};
use crate::model::{Document, Query, RankedResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Turns text into a vector. Any `Fn(&str) -> Result<Vec<f32>>` qualifies.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

impl<F> Embedder for F
where
    F: Fn(&str) -> Result<Vec<f32>>,
{
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self(text)
    }
}

/// Nearest-neighbour index addressed by insertion position.
pub trait VectorIndex: Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Append a vector; it receives position `len()` before the call.
    fn add(&mut self, vector: &[f32]);
    /// Up to `k` `(position, score)` pairs, best first.
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;
}

/// Exact inner-product index over a flat row-major buffer.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }
}

impl VectorIndex for FlatIpIndex {
    fn dim(&self) -> usize { self.dim }

    fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    fn add(&mut self, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dim);
        self.data.extend_from_slice(vector);
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 || self.dim == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(pos, row)| (pos, dot(row, query)))
            .collect();
        // stable: equal scores stay in insertion order, NaN scores sink to the end
        scored.sort_by(|a, b| a.1.is_nan().cmp(&b.1.is_nan()).then(b.1.total_cmp(&a.1)));
        scored.truncate(k);
        scored
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `v` to unit L2 norm in place. Zero vectors are left untouched.
pub fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Vectors keyed by entity id, in a stable insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSet {
    pub ids: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl EmbeddingSet {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, id: impl Into<String>, vector: Vec<f32>) {
        self.ids.push(id.into());
        self.vectors.push(vector);
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Common dimension of all vectors; `None` for an empty set.
    pub fn dim(&self) -> Result<Option<usize>> {
        let Some(first) = self.vectors.first() else { return Ok(None) };
        let expected = first.len();
        for (id, v) in self.ids.iter().zip(&self.vectors) {
            if v.len() != expected {
                return Err(BenchError::DimensionMismatch { id: id.clone(), expected, actual: v.len() });
            }
        }
        Ok(Some(expected))
    }

    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.vectors.iter_mut().for_each(|v| normalize_l2(v));
        out
    }
}

/// Run the embedder for one entity, naming the entity in any failure.
fn embed_one<E: Embedder + ?Sized>(embedder: &E, id: &str, text: &str) -> Result<Vec<f32>> {
    let vector = embedder
        .embed(text)
        .map_err(|e| BenchError::Embedding { id: id.to_string(), reason: e.to_string() })?;
    if vector.is_empty() {
        return Err(BenchError::Embedding { id: id.to_string(), reason: "empty vector".into() });
    }
    Ok(vector)
}

/// Embed the text of every document that has any. Documents without text
/// are not indexed.
pub fn embed_documents<E: Embedder + ?Sized>(embedder: &E, docs: &[Document]) -> Result<EmbeddingSet> {
    let mut set = EmbeddingSet::new();
    for doc in docs {
        if let Some(text) = doc.text.as_deref() {
            set.push(doc.doc_no.clone(), embed_one(embedder, &doc.doc_no, text)?);
        }
    }
    tracing::info!(documents = docs.len(), embedded = set.len(), "documents embedded");
    Ok(set)
}

pub fn embed_queries<E: Embedder + ?Sized>(embedder: &E, queries: &[Query]) -> Result<EmbeddingSet> {
    let mut set = EmbeddingSet::new();
    for q in queries.iter().filter(|q| !q.query_text.is_empty()) {
        set.push(q.query_no.clone(), embed_one(embedder, &q.query_no, &q.query_text)?);
    }
    tracing::info!(queries = queries.len(), embedded = set.len(), "queries embedded");
    Ok(set)
}

/// Top-`k` retrieval with the default exact index.
pub fn retrieve(docs: &EmbeddingSet, queries: &EmbeddingSet, k: usize) -> Result<Vec<RankedResult>> {
    retrieve_with(FlatIpIndex::new, docs, queries, k)
}

/// Top-`k` retrieval with a caller-chosen index, built by `make_index(dim)`.
///
/// Vectors are L2-normalized first. Every query yields one result, in query
/// order; an empty document set gives every query an empty hit list.
pub fn retrieve_with<I, F>(make_index: F, docs: &EmbeddingSet, queries: &EmbeddingSet, k: usize) -> Result<Vec<RankedResult>>
where
    I: VectorIndex,
    F: FnOnce(usize) -> I,
{
    let Some(dim) = docs.dim()? else {
        tracing::warn!(queries = queries.len(), "no document embeddings; all results empty");
        return Ok(queries
            .ids
            .iter()
            .map(|q| RankedResult { query_no: q.clone(), hits: Vec::new() })
            .collect());
    };
    for (id, v) in queries.ids.iter().zip(&queries.vectors) {
        if v.len() != dim {
            return Err(BenchError::DimensionMismatch { id: id.clone(), expected: dim, actual: v.len() });
        }
    }

    let docs = docs.normalized();
    let queries = queries.normalized();
    let mut index = make_index(dim);
    for v in &docs.vectors {
        index.add(v);
    }
    tracing::info!(indexed = index.len(), dim, top_k = k, "vector index built");

    let results: Vec<RankedResult> = queries
        .ids
        .par_iter()
        .zip(queries.vectors.par_iter())
        .map(|(query_no, v)| RankedResult {
            query_no: query_no.clone(),
            hits: index
                .search(v, k)
                .into_iter()
                .map(|(pos, score)| (docs.ids[pos].clone(), score))
                .collect(),
        })
        .collect();
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rows: Vec<(&str, Vec<f32>)>) -> EmbeddingSet {
        let mut s = EmbeddingSet::new();
        for (id, v) in rows {
            s.push(id, v);
        }
        s
    }

    #[test]
    fn normalize_gives_unit_norm_and_keeps_zero() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        let mut z = vec![0.0, 0.0];
        normalize_l2(&mut z);
        assert_eq!(z, vec![0.0, 0.0]);
    }

    #[test]
    fn results_have_min_k_n_hits_sorted_by_score() {
        let docs = set(vec![("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0]), ("c", vec![1.0, 1.0])]);
        let queries = set(vec![("q1", vec![2.0, 0.1]), ("q2", vec![0.0, 5.0])]);
        for k in [1, 2, 3, 10] {
            let res = retrieve(&docs, &queries, k).unwrap();
            assert_eq!(res.len(), 2);
            for r in &res {
                assert_eq!(r.hits.len(), k.min(3));
                assert!(r.hits.windows(2).all(|w| w[0].1 >= w[1].1));
            }
        }
        let res = retrieve(&docs, &queries, 3).unwrap();
        assert_eq!(res[0].hits[0].0, "a");
        assert_eq!(res[1].hits[0].0, "b");
    }

    #[test]
    fn nan_scores_rank_last_without_panicking() {
        let mut index = FlatIpIndex::new(2);
        index.add(&[f32::NAN, 0.0]);
        index.add(&[0.5, 0.0]);
        index.add(&[1.0, 0.0]);
        let hits = index.search(&[1.0, 0.0], 3);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![2, 1, 0]);
        assert!(hits[2].1.is_nan());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let docs = set(vec![("z", vec![1.0, 0.0]), ("a", vec![2.0, 0.0]), ("m", vec![0.5, 0.0])]);
        let queries = set(vec![("q", vec![1.0, 0.0])]);
        let res = retrieve(&docs, &queries, 3).unwrap();
        let order: Vec<&str> = res[0].hits.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let docs = set(vec![("a", vec![1.0, 0.0])]);
        let queries = set(vec![("q", vec![1.0, 0.0, 0.0])]);
        let err = retrieve(&docs, &queries, 1).unwrap_err();
        assert!(matches!(err, BenchError::DimensionMismatch { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn empty_document_set_yields_empty_results() {
        let queries = set(vec![("q", vec![1.0])]);
        let res = retrieve(&EmbeddingSet::new(), &queries, 5).unwrap();
        assert_eq!(res.len(), 1);
        assert!(res[0].hits.is_empty());
    }

    #[test]
    fn closures_act_as_embedders() {
        let embedder = |text: &str| -> Result<Vec<f32>> { Ok(vec![text.len() as f32, 1.0]) };
        let docs = vec![
            Document { doc_no: "d1".into(), text: Some("abc".into()), ..Document::default() },
            Document { doc_no: "d2".into(), ..Document::default() },
        ];
        let set = embed_documents(&embedder, &docs).unwrap();
        assert_eq!(set.ids, vec!["d1".to_string()]);
        assert_eq!(set.vectors[0], vec![3.0, 1.0]);
    }

    #[test]
    fn queries_without_text_are_not_embedded() {
        let embedder = |text: &str| -> Result<Vec<f32>> { Ok(vec![text.len() as f32]) };
        let queries = vec![Query::new("301", "oil spill"), Query::new("302", "")];
        let set = embed_queries(&embedder, &queries).unwrap();
        assert_eq!(set.ids, vec!["301".to_string()]);
        assert_eq!(set.vectors[0], vec![9.0]);
    }

    #[test]
    fn embedder_failures_name_the_entity() {
        let failing = |_: &str| -> Result<Vec<f32>> { Err(BenchError::io("model.bin", std::io::Error::new(std::io::ErrorKind::Other, "model offline"))) };
        match embed_queries(&failing, &[Query::new("301", "oil")]) {
            Err(BenchError::Embedding { id, reason }) => {
                assert_eq!(id, "301");
                assert!(reason.contains("model offline"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        let hollow = |_: &str| -> Result<Vec<f32>> { Ok(Vec::new()) };
        let docs = vec![Document { doc_no: "FT1".into(), text: Some("x".into()), ..Document::default() }];
        assert!(matches!(embed_documents(&hollow, &docs), Err(BenchError::Embedding { id, .. }) if id == "FT1"));
    }
}
