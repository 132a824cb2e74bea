//! Relevance judgments: reading qrels files and linking them to queries.

use crate::error::{BenchError, Result};
use crate::model::{DocNo, DocumentIdIndex, Query, QueryNo, RelevanceJudgment};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Counters reported by [`link_relevance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub files_read: usize,
    pub lines: usize,
    pub malformed: usize,
    pub relevant_linked: usize,
    pub unknown_queries: usize,
}

struct FileJudgments {
    lines: usize,
    malformed: usize,
    judgments: Vec<RelevanceJudgment>,
}

fn read_judgment_file(path: &Path) -> Option<FileJudgments> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "judgment file not found, skipping");
        return None;
    }
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "judgment path is not a file, skipping");
        return None;
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "judgment file unreadable, skipping");
            return None;
        }
    };
    tracing::debug!(path = %path.display(), "reading judgments");

    let mut out = FileJudgments { lines: 0, malformed: 0, judgments: Vec::new() };
    for line in BufReader::new(file).split(b'\n') {
        let line = match line {
            Ok(l) => l,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "read error, rest of file ignored");
                break;
            }
        };
        out.lines += 1;
        match RelevanceJudgment::parse(&String::from_utf8_lossy(&line)) {
            Some(j) => out.judgments.push(j),
            None => out.malformed += 1,
        }
    }
    Some(out)
}

/// Read every readable judgment file, in parallel, keeping input order.
/// Fails only when no path at all could be opened.
fn read_all<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Vec<FileJudgments>> {
    let files: Vec<FileJudgments> = paths
        .par_iter()
        .map(|p| read_judgment_file(p.as_ref()))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();
    if files.is_empty() {
        return Err(BenchError::NoValidRelevanceInput { attempted: paths.len() });
    }
    Ok(files)
}

/// Append every relevant, known document to the matching query.
///
/// Judgments are applied in file order, then line order. A `(query, doc)`
/// pair repeated across files is appended once per occurrence; judgments for
/// unknown queries or unknown documents are ignored.
pub fn link_relevance<P: AsRef<Path> + Sync>(
    paths: &[P],
    queries: &mut [Query],
    doc_ids: &DocumentIdIndex,
) -> Result<LinkStats> {
    let files = read_all(paths)?;

    let mut position: HashMap<QueryNo, usize> = HashMap::with_capacity(queries.len());
    for (i, q) in queries.iter().enumerate() {
        position.entry(q.query_no.clone()).or_insert(i);
    }

    let mut stats = LinkStats { files_read: files.len(), ..LinkStats::default() };
    for file in files {
        stats.lines += file.lines;
        stats.malformed += file.malformed;
        for j in file.judgments {
            if !j.is_relevant() || !doc_ids.contains(&j.doc_no) {
                continue;
            }
            match position.get(&j.query_no) {
                Some(&i) => {
                    queries[i].add_relevant_doc(j.doc_no);
                    stats.relevant_linked += 1;
                }
                None => stats.unknown_queries += 1,
            }
        }
    }
    tracing::info!(
        files = stats.files_read,
        lines = stats.lines,
        malformed = stats.malformed,
        relevant = stats.relevant_linked,
        "relevance judgments linked"
    );
    Ok(stats)
}

/// Documents judged non-relevant (`relevance == 0`) per query, restricted to
/// known documents, deduplicated, in first-seen order.
pub fn collect_judged_negatives<P: AsRef<Path> + Sync>(
    paths: &[P],
    doc_ids: &DocumentIdIndex,
) -> Result<BTreeMap<QueryNo, Vec<DocNo>>> {
    let mut negatives: BTreeMap<QueryNo, Vec<DocNo>> = BTreeMap::new();
    let mut seen: HashSet<(QueryNo, DocNo)> = HashSet::new();
    for file in read_all(paths)? {
        for j in file.judgments {
            if !j.is_judged_non_relevant() || !doc_ids.contains(&j.doc_no) {
                continue;
            }
            if seen.insert((j.query_no.clone(), j.doc_no.clone())) {
                negatives.entry(j.query_no).or_default().push(j.doc_no);
            }
        }
    }
    Ok(negatives)
}

/// Relevant judgments per query that point at known documents.
///
/// Every query with at least one `relevance == 1` line appears, with count 0
/// when none of its relevant documents is in the collection.
pub fn relevance_counts<P: AsRef<Path> + Sync>(
    paths: &[P],
    doc_ids: &DocumentIdIndex,
) -> Result<BTreeMap<QueryNo, usize>> {
    let mut counts: BTreeMap<QueryNo, usize> = BTreeMap::new();
    for file in read_all(paths)? {
        for j in file.judgments.into_iter().filter(RelevanceJudgment::is_relevant) {
            let known = doc_ids.contains(&j.doc_no);
            let count = counts.entry(j.query_no).or_insert(0);
            if known {
                *count += 1;
            }
        }
    }
    Ok(counts)
}
