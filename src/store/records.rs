//! Record types persisted by the paper store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked research interest with its validated arXiv query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    /// SQLite rowid.
    pub id: i64,

    /// Short unique label, e.g. "agent planning".
    pub name: String,

    /// Free-text description; doubles as the relevance prompt context.
    pub description: String,

    /// Validated arXiv query string.
    pub query: String,

    /// Ingestion cutoff for the next run; None until the first successful run.
    pub last_run_at: Option<DateTime<Utc>>,

    /// Inactive topics are skipped by update runs.
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

/// One arXiv paper, keyed by base id with the version suffix stripped.
///
/// A base id holds exactly one row carrying the highest version observed
/// so far. Later feed sightings with an older `updated_at` never regress it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    /// Base arXiv id, e.g. "2310.00012" or "cs.AI/0101001".
    pub id: String,

    /// Highest version observed so far.
    pub version: i64,

    pub title: String,

    /// Author names in feed order.
    pub authors: Vec<String>,

    pub published_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Abstract text.
    pub summary: String,

    pub pdf_url: Option<String>,
}

/// Relevance verdict and digest for one (paper, topic) pair.
///
/// At most one link exists per pair; reprocessing overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperTopicLink {
    pub paper_id: String,

    pub topic_id: i64,

    /// 0.0 to 10.0 as judged by the relevance prompt.
    pub relevance_score: f64,

    pub is_relevant: bool,

    /// Model's explanation for the score.
    pub reasoning: String,

    /// Rendered summary markdown; None when the paper was judged irrelevant.
    pub digest: Option<String>,

    /// Short lowercase labels, at most five.
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
}
