//! Paperboy - personal arXiv paper triage
//!
//! Topics described in plain language are translated into arXiv queries,
//! new papers are ingested and deduplicated by version, an LLM scores
//! each paper's relevance, and relevant papers get a short digest kept
//! alongside the verdict in SQLite.

pub mod arxiv;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod llm;
pub mod report;
pub mod store;

pub use error::{PaperboyError, Result};
