pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod interchange;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod qrels;
pub mod retrieval;
pub mod split;
pub mod tagstream;
pub mod tokenizer;
pub mod topics;

pub use config::PipelineConfig;
pub use error::{BenchError, Result};
pub use model::*;
pub use pipeline::{PipelineContext, PipelineInputs, Snapshot};
