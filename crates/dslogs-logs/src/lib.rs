//! Log processing for dslogs
//!
//! This crate provides line parsing, consensus relevance filtering,
//! multiplexed output, and the per-run-directory pipeline.

mod error;
mod filter;
mod parser;
mod pipeline;
mod writer;

pub use error::{PipelineError, RunError, SinkError};
pub use filter::{CONSENSUS_KEYWORDS, LevelFilter, RelevanceFilter};
pub use parser::{LogParser, extract_payload, payload_span};
pub use pipeline::{
    DEFAULT_OUT_SUBDIR, Pipeline, PipelineConfig, ProcessReport, RunOutcome, process,
};
pub use writer::{ALL_NODES_JSONL, ALL_NODES_LOG, MultiplexedWriter, node_jsonl_name, node_log_name};

// Re-export types used in our public API
pub use dslogs_discovery::RunHints;
pub use dslogs_types::{Counts, EnrichedRecord, LogRecord, RunDirectory};
