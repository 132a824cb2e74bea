//! In-memory inverted index with BM25 scoring: the sparse lexical baseline.
//!
//! Documents are indexed on their passage (headline plus text); documents
//! with an empty passage are skipped, so the index covers exactly the rows
//! of the collection export.

use crate::model::{DocNo, Document, Query, RankedResult};
use crate::tokenizer::Analyzer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub dictionary: HashMap<String, TermId>,
    /// Indexed by term id; each list sorted by doc id.
    pub postings: Vec<Vec<Posting>>,
    pub doc_nos: Vec<DocNo>,
    pub doc_lens: Vec<u32>,
    total_len: u64,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Tokenize passages in parallel, then insert in document order.
    pub fn build(analyzer: &Analyzer, docs: &[Document]) -> Self {
        let tokenized: Vec<(&str, Vec<String>)> = docs
            .par_iter()
            .filter_map(|d| {
                let passage = d.passage();
                (!passage.is_empty()).then(|| (d.doc_no.as_str(), analyzer.tokenize(&passage)))
            })
            .collect();

        let mut index = Self::new();
        for (doc_no, tokens) in &tokenized {
            index.add(doc_no, tokens);
        }
        tracing::info!(docs = index.num_docs(), terms = index.num_terms(), "inverted index built");
        index
    }

    /// Append one document; returns its doc id.
    pub fn add(&mut self, doc_no: &str, tokens: &[String]) -> DocId {
        let doc_id = self.doc_nos.len() as DocId;
        let mut tf: HashMap<TermId, u32> = HashMap::new();
        for token in tokens {
            let next = self.postings.len() as TermId;
            let tid = *self.dictionary.entry(token.clone()).or_insert(next);
            if tid == next {
                self.postings.push(Vec::new());
            }
            *tf.entry(tid).or_insert(0) += 1;
        }
        for (tid, tf) in tf {
            self.postings[tid as usize].push(Posting { doc_id, tf });
        }
        self.doc_nos.push(doc_no.to_string());
        self.doc_lens.push(tokens.len() as u32);
        self.total_len += tokens.len() as u64;
        doc_id
    }

    pub fn num_docs(&self) -> usize { self.doc_nos.len() }

    pub fn num_terms(&self) -> usize { self.dictionary.len() }

    pub fn df(&self, term: &str) -> usize {
        self.dictionary.get(term).map_or(0, |&t| self.postings[t as usize].len())
    }

    fn avg_doc_len(&self) -> f32 {
        if self.doc_nos.is_empty() { 0.0 } else { self.total_len as f32 / self.doc_nos.len() as f32 }
    }

    /// Top-`k` documents for an analyzed query. Repeated query terms count
    /// once per occurrence; terms outside the dictionary contribute nothing.
    pub fn search(&self, query_terms: &[String], k: usize, params: &Bm25Params) -> Vec<(DocNo, f32)> {
        if k == 0 || self.doc_nos.is_empty() {
            return Vec::new();
        }
        let mut qtf: HashMap<TermId, u32> = HashMap::new();
        for term in query_terms {
            if let Some(&tid) = self.dictionary.get(term) {
                *qtf.entry(tid).or_insert(0) += 1;
            }
        }

        let n = self.doc_nos.len() as f32;
        let avgdl = self.avg_doc_len().max(f32::EPSILON);
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        for (tid, q) in qtf {
            let plist = &self.postings[tid as usize];
            let df = plist.len() as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            for p in plist {
                let tf = p.tf as f32;
                let dl = self.doc_lens[p.doc_id as usize] as f32;
                let norm = params.k1 * (1.0 - params.b + params.b * dl / avgdl);
                *scores.entry(p.doc_id).or_insert(0.0) += q as f32 * idf * tf * (params.k1 + 1.0) / (tf + norm);
            }
        }

        let mut scored: Vec<(DocId, f32)> = scores.into_iter().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored.into_iter().map(|(d, s)| (self.doc_nos[d as usize].clone(), s)).collect()
    }
}

/// One BM25 [`RankedResult`] per query, in query order.
pub fn bm25_run(
    index: &InvertedIndex,
    analyzer: &Analyzer,
    queries: &[Query],
    k: usize,
    params: &Bm25Params,
) -> Vec<RankedResult> {
    let results: Vec<RankedResult> = queries
        .par_iter()
        .map(|q| RankedResult {
            query_no: q.query_no.clone(),
            hits: index.search(&analyzer.tokenize(&q.query_text), k, params),
        })
        .collect();
    let empty = results.iter().filter(|r| r.hits.is_empty()).count();
    if empty > 0 {
        tracing::warn!(queries = results.len(), empty, "queries with no lexical match");
    }
    results
}
