//! Plain-text exports consumed by external tooling, plus the TREC run format
//! read back for evaluation.

use crate::error::{BenchError, Result};
use crate::model::{Document, DocumentIdIndex, Query, QueryNo, RankedResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

struct Sink<'p> {
    path: &'p Path,
    w: BufWriter<File>,
}

impl<'p> Sink<'p> {
    fn create(path: &'p Path) -> Result<Self> {
        let f = File::create(path).map_err(|e| BenchError::io(path, e))?;
        Ok(Self { path, w: BufWriter::new(f) })
    }

    fn line(&mut self, s: &str) -> Result<()> {
        writeln!(self.w, "{s}").map_err(|e| BenchError::io(self.path, e))
    }

    fn finish(mut self) -> Result<()> {
        self.w.flush().map_err(|e| BenchError::io(self.path, e))
    }
}

fn flatten(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

/// One `doc_no` per line, sorted.
pub fn write_doc_ids(path: &Path, ids: &DocumentIdIndex) -> Result<()> {
    let mut out = Sink::create(path)?;
    for id in ids.sorted() {
        out.line(id)?;
    }
    out.finish()
}

/// `query_no: count` per line in key order.
pub fn write_relevance_counts(path: &Path, counts: &BTreeMap<QueryNo, usize>) -> Result<()> {
    let mut out = Sink::create(path)?;
    for (q, n) in counts {
        out.line(&format!("{q}: {n}"))?;
    }
    out.finish()
}

/// `doc_no<TAB>passage`. Documents whose passage is empty are left out.
/// Returns the number of rows written.
pub fn write_collection_tsv(path: &Path, docs: &[Document]) -> Result<usize> {
    let mut out = Sink::create(path)?;
    let mut written = 0;
    for doc in docs {
        let passage = flatten(&doc.passage());
        if passage.trim().is_empty() {
            continue;
        }
        out.line(&format!("{}\t{}", doc.doc_no, passage))?;
        written += 1;
    }
    out.finish()?;
    Ok(written)
}

pub fn write_queries_tsv(path: &Path, queries: &[Query]) -> Result<()> {
    let mut out = Sink::create(path)?;
    for q in queries {
        out.line(&format!("{}\t{}", q.query_no, flatten(&q.query_text)))?;
    }
    out.finish()
}

/// Reads `id<TAB>text` rows into text-only queries. Rows without exactly two
/// fields are skipped with a warning.
pub fn read_queries_tsv(path: &Path) -> Result<Vec<Query>> {
    let f = File::open(path).map_err(|e| BenchError::io(path, e))?;
    let mut queries = Vec::new();
    for (i, line) in BufReader::new(f).lines().enumerate() {
        let line = line.map_err(|e| BenchError::io(path, e))?;
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.as_slice() {
            [id, text] => queries.push(Query::new(*id, *text)),
            _ => {
                if !line.trim().is_empty() {
                    tracing::warn!(path = %path.display(), line = i + 1, "skipping malformed TSV row");
                }
            }
        }
    }
    Ok(queries)
}

#[derive(Serialize)]
struct Scored<'a> {
    pid: &'a str,
    #[serde(rename = "ce-score")]
    ce_score: f32,
}

#[derive(Serialize)]
struct Negatives<'a> {
    custom: Vec<Scored<'a>>,
}

#[derive(Serialize)]
struct HardNegativeRecord<'a> {
    qid: &'a str,
    pos: Vec<Scored<'a>>,
    neg: Negatives<'a>,
}

/// One JSON object per query with at least one relevant document.
/// Returns the number of records written.
pub fn write_hard_negatives(path: &Path, queries: &[Query]) -> Result<usize> {
    let mut out = Sink::create(path)?;
    let mut written = 0;
    for q in queries.iter().filter(|q| q.num_relevant() > 0) {
        let record = HardNegativeRecord {
            qid: &q.query_no,
            pos: q.relevant_docs.iter().map(|d| Scored { pid: d, ce_score: 1.0 }).collect(),
            neg: Negatives {
                custom: q
                    .non_relevant_docs
                    .iter()
                    .flatten()
                    .map(|d| Scored { pid: d, ce_score: 0.0 })
                    .collect(),
            },
        };
        out.line(&serde_json::to_string(&record)?)?;
        written += 1;
    }
    out.finish()?;
    Ok(written)
}

/// `query_no 0 doc_no relevance`, relevant rows first, then the query's
/// non-relevant rows.
pub fn write_test_qrels(path: &Path, queries: &[Query]) -> Result<()> {
    let mut out = Sink::create(path)?;
    for q in queries {
        for d in &q.relevant_docs {
            out.line(&format!("{}\t0\t{}\t1", q.query_no, d))?;
        }
        for d in q.non_relevant_docs.iter().flatten() {
            out.line(&format!("{}\t0\t{}\t0", q.query_no, d))?;
        }
    }
    out.finish()
}

/// TREC run format: `query_no Q0 doc_no rank score tag`, ranks from 1.
pub fn write_run(path: &Path, results: &[RankedResult], tag: &str) -> Result<()> {
    let mut out = Sink::create(path)?;
    for r in results {
        for (rank, (doc, score)) in r.hits.iter().enumerate() {
            out.line(&format!("{} Q0 {} {} {:.6} {}", r.query_no, doc, rank + 1, score, tag))?;
        }
    }
    out.finish()
}

pub fn read_run(path: &Path) -> Result<Vec<RankedResult>> {
    let f = File::open(path).map_err(|e| BenchError::io(path, e))?;
    let mut order: Vec<QueryNo> = Vec::new();
    let mut rows: HashMap<QueryNo, Vec<(usize, String, f32)>> = HashMap::new();
    let mut skipped = 0usize;

    for line in BufReader::new(f).lines() {
        let line = line.map_err(|e| BenchError::io(path, e))?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let parsed = match fields.as_slice() {
            [q, _, d, rank, score, ..] => match (rank.parse::<usize>(), score.parse::<f32>()) {
                (Ok(rank), Ok(score)) => Some((q.to_string(), rank, d.to_string(), score)),
                _ => None,
            },
            _ => None,
        };
        let Some((q, rank, d, score)) = parsed else {
            skipped += 1;
            continue;
        };
        if !rows.contains_key(&q) {
            order.push(q.clone());
        }
        rows.entry(q).or_default().push((rank, d, score));
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped malformed run lines");
    }

    Ok(order
        .into_iter()
        .map(|q| {
            let mut hits = rows.remove(&q).unwrap_or_default();
            hits.sort_by_key(|(rank, _, _)| *rank);
            RankedResult { query_no: q, hits: hits.into_iter().map(|(_, d, s)| (d, s)).collect() }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn query(id: &str, rel: &[&str], neg: Option<&[&str]>) -> Query {
        let mut q = Query::new(id, format!("topic {id}"));
        for d in rel {
            q.add_relevant_doc(*d);
        }
        q.non_relevant_docs = neg.map(|n| n.iter().map(|d| d.to_string()).collect());
        q
    }

    #[test]
    fn collection_flattens_and_skips_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("collection.tsv");
        let docs = vec![
            Document { doc_no: "A".into(), headline: Some("Head".into()), text: Some("line one\n\tline two".into()), ..Default::default() },
            Document { doc_no: "B".into(), ..Default::default() },
        ];
        assert_eq!(write_collection_tsv(&path, &docs).unwrap(), 1);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 1);
        let (id, text) = raw.trim_end().split_once('\t').unwrap();
        assert_eq!(id, "A");
        assert!(!text.contains('\t') && !text.contains('\n'));
        assert!(text.starts_with("Head line one"));
    }

    #[test]
    fn counts_are_sorted_with_colon() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counts.txt");
        let counts: BTreeMap<QueryNo, usize> = [("402".to_string(), 0), ("301".to_string(), 7)].into_iter().collect();
        write_relevance_counts(&path, &counts).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "301: 7\n402: 0\n");
    }

    #[test]
    fn test_qrels_list_relevant_then_non_relevant() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.qrels");
        write_test_qrels(&path, &[query("1", &["A", "B"], Some(&["C"]))]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\t0\tA\t1\n1\t0\tB\t1\n1\t0\tC\t0\n");
    }

    #[test]
    fn hard_negatives_skip_queries_without_positives() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hn.jsonl");
        let n = write_hard_negatives(&path, &[query("1", &["A"], Some(&["X"])), query("2", &[], None)]).unwrap();
        assert_eq!(n, 1);
        let line = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(v["qid"], "1");
        assert_eq!(v["pos"][0]["pid"], "A");
        assert_eq!(v["pos"][0]["ce-score"], 1.0);
        assert_eq!(v["neg"]["custom"][0]["pid"], "X");
        assert_eq!(v["neg"]["custom"][0]["ce-score"], 0.0);
    }

    #[test]
    fn queries_tsv_reads_back_and_skips_bad_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.tsv");
        write_queries_tsv(&path, &[Query::new("1", "oil\tspill")]).unwrap();
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("no-tab-here\n");
        std::fs::write(&path, raw).unwrap();
        let back = read_queries_tsv(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].query_text, "oil spill");
    }

    #[test]
    fn run_file_keeps_rank_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.txt");
        let results = vec![RankedResult { query_no: "7".into(), hits: vec![("D1".into(), 0.9), ("D2".into(), 0.5)] }];
        write_run(&path, &results, "dense").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("7 Q0 D1 1 0.900000 dense\n"));

        let shuffled: String = text.lines().rev().map(|l| format!("{l}\n")).collect::<String>() + "garbage\n";
        std::fs::write(&path, shuffled).unwrap();
        let back = read_run(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].hits.iter().map(|(d, _)| d.as_str()).collect::<Vec<_>>(), vec!["D1", "D2"]);
    }
}
