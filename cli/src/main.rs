use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ftbench_core::corpus::parse_documents;
use ftbench_core::evaluation::{evaluate_run, ElinorEvaluator};
use ftbench_core::index::{bm25_run, InvertedIndex};
use ftbench_core::interchange::{read_queries_tsv, read_run, write_doc_ids, write_relevance_counts, write_run};
use ftbench_core::persist::{load_documents, load_embeddings, SnapshotPaths};
use ftbench_core::qrels::relevance_counts;
use ftbench_core::retrieval::retrieve;
use ftbench_core::tokenizer::{load_stopwords, Analyzer};
use ftbench_core::{PipelineConfig, PipelineContext, PipelineInputs, Snapshot};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ftbench")]
#[command(about = "Prepare, run and score the FT retrieval benchmark", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitChoice {
    Test,
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// List every document number in the corpus, sorted
    Docnos {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Count relevant, known documents per judged query
    RelCounts {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long, num_args = 1.., required = true)]
        qrels: Vec<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Parse, link and split; write the snapshot and text exports
    Prepare {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long, num_args = 1.., required = true)]
        topics: Vec<PathBuf>,
        #[arg(long, num_args = 1.., required = true)]
        qrels: Vec<PathBuf>,
        /// Output directory
        #[arg(long)]
        output: PathBuf,
        /// JSON run configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        test_size: Option<usize>,
        #[arg(long)]
        min_relevant: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Fallback negatives sampled per train query (0 disables)
        #[arg(long)]
        negatives: Option<usize>,
        /// Use relevance-0 judgments as negatives
        #[arg(long, default_value_t = false)]
        judged_negatives: bool,
    },
    /// Exact top-k search of query embeddings against document embeddings
    Retrieve {
        #[arg(long)]
        doc_embeddings: PathBuf,
        #[arg(long)]
        query_embeddings: PathBuf,
        #[arg(long, default_value_t = 1000)]
        top_k: usize,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = "ftbench")]
        tag: String,
    },
    /// BM25 top-k over the documents of a prepared snapshot
    Bm25 {
        #[arg(long)]
        snapshot: PathBuf,
        /// `id<TAB>text` queries; the snapshot's test split when omitted
        #[arg(long)]
        queries: Option<PathBuf>,
        /// One stopword per line; replaces the built-in English list
        #[arg(long)]
        stopwords: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        no_stem: bool,
        /// Defaults to `top_k` from the configuration
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = "bm25")]
        tag: String,
    },
    /// Score a TREC run file against a prepared snapshot
    Evaluate {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        run: PathBuf,
        #[arg(long, value_enum, default_value_t = SplitChoice::Test)]
        split: SplitChoice,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the JSON report here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Docnos { corpus, output } => {
            let parsed = parse_documents(&corpus).with_context(|| format!("parsing corpus {}", corpus.display()))?;
            write_doc_ids(&output, &parsed.doc_ids).context("writing document id listing")?;
            tracing::info!(count = parsed.doc_ids.len(), output = %output.display(), "document ids written");
            Ok(())
        }
        Commands::RelCounts { corpus, qrels, output } => {
            let parsed = parse_documents(&corpus).with_context(|| format!("parsing corpus {}", corpus.display()))?;
            let counts = relevance_counts(&qrels, &parsed.doc_ids).context("reading relevance judgments")?;
            write_relevance_counts(&output, &counts).context("writing relevance counts")?;
            tracing::info!(queries = counts.len(), output = %output.display(), "relevance counts written");
            Ok(())
        }
        Commands::Prepare { corpus, topics, qrels, output, config, test_size, min_relevant, seed, negatives, judged_negatives } => {
            let mut cfg = PipelineConfig::resolve(config.as_deref()).context("loading configuration")?;
            if let Some(n) = test_size {
                cfg.split.test_size = n;
            }
            if let Some(n) = min_relevant {
                cfg.split.min_relevant_docs = n;
            }
            if let Some(s) = seed {
                cfg.set_seed(s);
            }
            if let Some(n) = negatives {
                cfg.negatives.per_query = n;
            }
            cfg.judged_negatives |= judged_negatives;
            prepare(PipelineInputs { corpus_dir: corpus, topic_files: topics, qrels_files: qrels }, cfg, output)
        }
        Commands::Retrieve { doc_embeddings, query_embeddings, top_k, output, tag } => {
            let docs = load_embeddings(&doc_embeddings).context("loading document embeddings")?;
            let queries = load_embeddings(&query_embeddings).context("loading query embeddings")?;
            let results = retrieve(&docs, &queries, top_k)?;
            write_run(&output, &results, &tag).context("writing run file")?;
            tracing::info!(queries = results.len(), top_k, output = %output.display(), "run written");
            Ok(())
        }
        Commands::Bm25 { snapshot, queries, stopwords, no_stem, top_k, config, output, tag } => {
            let cfg = PipelineConfig::resolve(config.as_deref()).context("loading configuration")?;
            let mut analyzer = match stopwords {
                Some(path) => Analyzer::new(load_stopwords(&path).with_context(|| format!("reading stopwords {}", path.display()))?),
                None => Analyzer::default(),
            };
            if no_stem {
                analyzer = analyzer.without_stemming();
            }
            let docs = load_documents(&SnapshotPaths::new(&snapshot))
                .with_context(|| format!("loading documents from {}", snapshot.display()))?;
            let queries = match queries {
                Some(path) => read_queries_tsv(&path).with_context(|| format!("reading queries {}", path.display()))?,
                None => Snapshot::load(&snapshot).context("loading snapshot")?.split.test,
            };
            let k = top_k.unwrap_or(cfg.top_k);
            let index = InvertedIndex::build(&analyzer, &docs);
            let results = bm25_run(&index, &analyzer, &queries, k, &cfg.bm25);
            write_run(&output, &results, &tag).context("writing run file")?;
            tracing::info!(queries = results.len(), top_k = k, output = %output.display(), "run written");
            Ok(())
        }
        Commands::Evaluate { snapshot, run, split, config, output } => {
            let cfg = PipelineConfig::resolve(config.as_deref()).context("loading configuration")?;
            let snap = Snapshot::load(&snapshot).with_context(|| format!("loading snapshot {}", snapshot.display()))?;
            let results = read_run(&run).with_context(|| format!("reading run {}", run.display()))?;
            let queries = match split {
                SplitChoice::Test => &snap.split.test,
                SplitChoice::All => &snap.queries,
            };
            let report = evaluate_run(&ElinorEvaluator, &results, queries, &cfg.metric_refs())?;
            print!("{}", report.render_table());
            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(&path, json).with_context(|| format!("writing report {}", path.display()))?;
                tracing::info!(output = %path.display(), "report written");
            }
            Ok(())
        }
    }
}

fn prepare(inputs: PipelineInputs, cfg: PipelineConfig, output: PathBuf) -> Result<()> {
    let ctx = PipelineContext::prepare(&inputs, cfg)?;
    let meta = ctx.write_snapshot(&output).context("writing snapshot")?;
    ctx.export(&output).context("writing exports")?;
    tracing::info!(
        output = %output.display(),
        docs = meta.num_docs,
        train = meta.num_train,
        test = meta.num_test,
        seed = meta.seed,
        "prepare complete"
    );
    Ok(())
}
