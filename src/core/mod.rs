//! The triage pipeline: query translation, feed ingestion, relevance
//! scoring, summarization, and the update loop that runs them in order.
//!
//! Each stage is a free function over the `PaperFeed`/`LlmClient` traits
//! so tests can script both sides. `UpdateRunner` wires the stages
//! together for a full run.

pub mod ingest;
pub mod relevance;
pub mod summary;
pub mod translate;
pub mod update;

pub use ingest::{IngestOutcome, IngestStatus, fetch_new_papers, split_versioned_id};
pub use relevance::{RELEVANCE_THRESHOLD, RelevanceVerdict, assess_relevance};
pub use summary::{PaperSummary, summarize_paper};
pub use translate::{translate_topic, validate_query};
pub use update::{
    PaperDisposition, PaperOutcome, TopicReport, UpdateOptions, UpdateRunner, regenerate_digests,
};
