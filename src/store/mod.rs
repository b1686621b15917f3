//! Storage layer for paperboy.
//!
//! A single SQLite database holds three tables: topics (what to watch),
//! papers (deduplicated by base arXiv id), and paper_topic_links (one
//! relevance verdict per pair).
//!
//! # Example
//!
//! ```ignore
//! use paperboy::store::PaperStore;
//! use std::path::Path;
//!
//! let store = PaperStore::open(Path::new("papers.db"))?;
//! let topic = store.add_topic("agents", "LLM agent planning", "cat:cs.AI")?;
//! let relevant = store.relevant_links(topic.id)?;
//! ```

mod paper_store;
mod records;

pub use paper_store::{PaperStore, StoreCounts};
pub use records::{Paper, PaperTopicLink, Topic};
