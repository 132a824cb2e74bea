//! End-to-end preparation run: parse, link, split, attach negatives, write.
//!
//! A [`PipelineContext`] owns everything one run produces. Later stages
//! borrow from it; nothing is kept in global state.

use crate::config::PipelineConfig;
use crate::corpus::{parse_documents, ParsedCorpus};
use crate::error::{BenchError, Result};
use crate::interchange;
use crate::model::{Query, Split};
use crate::persist::{self, MetaFile, SnapshotPaths, SNAPSHOT_VERSION};
use crate::qrels::{collect_judged_negatives, link_relevance, LinkStats};
use crate::split::{attach_negatives, negative_pool, split_queries, NegativePolicy, NegativeStats, SplitSummary};
use crate::topics::parse_queries;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub corpus_dir: PathBuf,
    pub topic_files: Vec<PathBuf>,
    pub qrels_files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub corpus: ParsedCorpus,
    /// Every parsed query after linking, including those with no relevant docs.
    pub queries: Vec<Query>,
    pub split: Split,
    pub link: LinkStats,
    pub train_negatives: NegativeStats,
    pub test_negatives: NegativeStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub collection_rows: usize,
    pub hard_negative_records: usize,
}

impl PipelineContext {
    pub fn prepare(inputs: &PipelineInputs, config: PipelineConfig) -> Result<Self> {
        let corpus = parse_documents(&inputs.corpus_dir)?;
        let mut queries = parse_queries(&inputs.topic_files);
        let link = link_relevance(&inputs.qrels_files, &mut queries, &corpus.doc_ids)?;

        let judged = if config.judged_negatives {
            collect_judged_negatives(&inputs.qrels_files, &corpus.doc_ids)?
        } else {
            BTreeMap::new()
        };

        let mut split = split_queries(queries.clone(), &config.split)?;
        let (train_negatives, test_negatives) = {
            let pool = negative_pool(&corpus.documents);
            let test_policy = NegativePolicy { seed: config.negatives.seed, ..NegativePolicy::explicit_only() };
            (
                attach_negatives(&mut split.train, &judged, &pool, &config.negatives),
                attach_negatives(&mut split.test, &judged, &pool, &test_policy),
            )
        };

        let summary = SplitSummary::of(&split);
        tracing::info!(
            docs = corpus.documents.len(),
            queries = queries.len(),
            train = summary.train,
            test = summary.test,
            test_min_relevant = summary.test_min_relevant,
            test_max_relevant = summary.test_max_relevant,
            test_mean_relevant = summary.test_mean_relevant,
            "benchmark prepared"
        );
        tracing::info!(
            explicit = train_negatives.explicit,
            sampled = train_negatives.sampled,
            without = train_negatives.without,
            "train negatives attached"
        );

        Ok(Self { config, corpus, queries, split, link, train_negatives, test_negatives })
    }

    pub fn summary(&self) -> SplitSummary {
        SplitSummary::of(&self.split)
    }

    pub fn write_snapshot(&self, dir: &Path) -> Result<MetaFile> {
        let paths = SnapshotPaths::new(dir);
        persist::save_documents(&paths, &self.corpus.documents)?;
        persist::save_queries(&paths, &self.queries)?;
        persist::save_split(&paths, &self.split)?;
        let meta = MetaFile {
            num_docs: self.corpus.documents.len(),
            num_queries: self.queries.len(),
            num_train: self.split.train.len(),
            num_test: self.split.test.len(),
            seed: self.config.split.seed,
            created_at: persist::now_rfc3339(),
            version: SNAPSHOT_VERSION,
        };
        persist::save_meta(&paths, &meta)?;
        Ok(meta)
    }

    /// Text exports next to the snapshot.
    pub fn export(&self, dir: &Path) -> Result<ExportStats> {
        std::fs::create_dir_all(dir).map_err(|e| BenchError::io(dir, e))?;
        let collection_rows = interchange::write_collection_tsv(&dir.join("collection.tsv"), &self.corpus.documents)?;
        interchange::write_queries_tsv(&dir.join("queries.train.tsv"), &self.split.train)?;
        interchange::write_queries_tsv(&dir.join("queries.test.tsv"), &self.split.test)?;
        let hard_negative_records = interchange::write_hard_negatives(&dir.join("hard-negatives.jsonl"), &self.split.train)?;
        interchange::write_test_qrels(&dir.join("test.qrels"), &self.split.test)?;
        tracing::info!(dir = %dir.display(), collection_rows, hard_negative_records, "exports written");
        Ok(ExportStats { collection_rows, hard_negative_records })
    }
}

/// A snapshot read back from disk.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub meta: MetaFile,
    pub queries: Vec<Query>,
    pub split: Split,
}

impl Snapshot {
    /// Documents are left on disk; evaluation only needs queries.
    pub fn load(dir: &Path) -> Result<Self> {
        let paths = SnapshotPaths::new(dir);
        Ok(Self {
            meta: persist::load_meta(&paths)?,
            queries: persist::load_queries(&paths)?,
            split: persist::load_split(&paths)?,
        })
    }
}
