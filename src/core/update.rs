//! The update run: ingest each active topic, score new papers, summarize
//! the relevant ones, and persist the verdicts.
//!
//! Failure isolation mirrors the store layout: a broken topic reports and
//! the run moves on; a broken paper reports and the topic moves on. Only
//! startup problems (no database, bad config) abort the whole run.

use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};

use crate::arxiv::PaperFeed;
use crate::core::ingest::{IngestStatus, fetch_new_papers};
use crate::core::relevance::assess_relevance;
use crate::core::summary::summarize_paper;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::store::{Paper, PaperStore, PaperTopicLink, Topic};

/// Options for one update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Cutoff override in dd-mm-yyyy form; beats each topic's stored cutoff.
    pub since: Option<String>,
    /// Rescore papers that already have a link for the topic.
    pub force: bool,
}

/// What happened to one paper during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PaperDisposition {
    Relevant { score: f64 },
    NotRelevant { score: f64 },
    /// Link already present and the run was not forced; no LLM call made.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PaperOutcome {
    pub id: String,
    pub title: String,
    pub disposition: PaperDisposition,
}

/// Per-topic summary of one update run.
#[derive(Debug)]
pub struct TopicReport {
    pub topic_id: i64,
    pub topic_name: String,
    /// The query that was run, for zero-result diagnostics.
    pub topic_query: String,
    pub status: IngestStatus,
    pub papers: Vec<PaperOutcome>,
}

impl TopicReport {
    /// Papers ingestion handed over this run.
    pub fn fetched(&self) -> usize {
        self.papers.len()
    }

    /// Papers that went through scoring.
    pub fn processed(&self) -> usize {
        self.papers
            .iter()
            .filter(|p| {
                matches!(
                    p.disposition,
                    PaperDisposition::Relevant { .. } | PaperDisposition::NotRelevant { .. }
                )
            })
            .count()
    }

    pub fn relevant(&self) -> usize {
        self.papers
            .iter()
            .filter(|p| matches!(p.disposition, PaperDisposition::Relevant { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.papers
            .iter()
            .filter(|p| p.disposition == PaperDisposition::Skipped)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.papers
            .iter()
            .filter(|p| matches!(p.disposition, PaperDisposition::Failed(_)))
            .count()
    }
}

/// Drives update runs over all active topics.
pub struct UpdateRunner<'a> {
    store: &'a PaperStore,
    feed: &'a dyn PaperFeed,
    llm: &'a dyn LlmClient,
    /// Pause between topics to spread the load.
    throttle: Duration,
}

impl<'a> UpdateRunner<'a> {
    pub fn new(
        store: &'a PaperStore,
        feed: &'a dyn PaperFeed,
        llm: &'a dyn LlmClient,
        throttle: Duration,
    ) -> Self {
        Self {
            store,
            feed,
            llm,
            throttle,
        }
    }

    /// Run ingestion and scoring for every active topic.
    pub async fn run(&self, options: &UpdateOptions) -> Result<Vec<TopicReport>> {
        let topics = self.store.active_topics()?;
        info!("update run over {} active topics", topics.len());

        let mut reports = Vec::with_capacity(topics.len());
        for (i, topic) in topics.iter().enumerate() {
            reports.push(self.run_topic(topic, options).await);

            if i + 1 < topics.len() && !self.throttle.is_zero() {
                debug!("throttling {:?} before next topic", self.throttle);
                tokio::time::sleep(self.throttle).await;
            }
        }

        Ok(reports)
    }

    async fn run_topic(&self, topic: &Topic, options: &UpdateOptions) -> TopicReport {
        let mut report = TopicReport {
            topic_id: topic.id,
            topic_name: topic.name.clone(),
            topic_query: topic.query.clone(),
            status: IngestStatus::Success,
            papers: Vec::new(),
        };

        let outcome =
            fetch_new_papers(self.feed, self.store, topic, options.since.as_deref()).await;
        report.status = outcome.status;

        match &report.status {
            IngestStatus::ZeroResults => {
                warn!(
                    "0 results for topic '{}'; check the query: {}",
                    topic.name, topic.query
                );
                return report;
            }
            IngestStatus::Error(message) => {
                warn!("skipping topic '{}': {}", topic.name, message);
                return report;
            }
            IngestStatus::Success => {}
        }

        for paper in &outcome.papers {
            let disposition = match self.process_paper(topic, paper, options.force).await {
                Ok(disposition) => disposition,
                Err(err) => {
                    warn!("error processing paper '{}': {}", paper.title, err);
                    PaperDisposition::Failed(err.to_string())
                }
            };
            report.papers.push(PaperOutcome {
                id: paper.id.clone(),
                title: paper.title.clone(),
                disposition,
            });
        }

        if let Err(err) = self.store.touch_topic_last_run(topic.id, Utc::now()) {
            warn!("could not advance last run for '{}': {}", topic.name, err);
        }

        info!(
            "topic '{}': {} fetched, {} relevant, {} skipped",
            topic.name,
            report.fetched(),
            report.relevant(),
            report.skipped()
        );
        report
    }

    /// Score one paper for one topic and persist the link.
    ///
    /// An existing link short-circuits before any LLM call unless forcing.
    async fn process_paper(
        &self,
        topic: &Topic,
        paper: &Paper,
        force: bool,
    ) -> Result<PaperDisposition> {
        if !force && self.store.link(&paper.id, topic.id)?.is_some() {
            debug!("already scored: {} for topic {}", paper.id, topic.id);
            return Ok(PaperDisposition::Skipped);
        }

        let verdict =
            assess_relevance(self.llm, &topic.description, &paper.title, &paper.summary).await;

        let (digest, tags) = if verdict.is_relevant {
            let summary = summarize_paper(self.llm, &paper.title, &paper.summary).await;
            (Some(summary.to_markdown()), summary.tags)
        } else {
            (None, Vec::new())
        };

        self.store.save_link(&PaperTopicLink {
            paper_id: paper.id.clone(),
            topic_id: topic.id,
            relevance_score: verdict.relevance_score,
            is_relevant: verdict.is_relevant,
            reasoning: verdict.reasoning,
            digest,
            tags,
            created_at: Utc::now(),
        })?;

        Ok(if verdict.is_relevant {
            PaperDisposition::Relevant {
                score: verdict.relevance_score,
            }
        } else {
            PaperDisposition::NotRelevant {
                score: verdict.relevance_score,
            }
        })
    }
}

/// Re-summarize every relevant link of a topic, overwriting stored digests.
pub async fn regenerate_digests(
    store: &PaperStore,
    llm: &dyn LlmClient,
    topic: &Topic,
) -> Result<usize> {
    let links = store.relevant_links(topic.id)?;
    let mut regenerated = 0;

    for (paper, mut link) in links {
        let summary = summarize_paper(llm, &paper.title, &paper.summary).await;
        link.digest = Some(summary.to_markdown());
        link.tags = summary.tags;

        if let Err(err) = store.save_link(&link) {
            warn!("could not save digest for '{}': {}", paper.title, err);
            continue;
        }
        regenerated += 1;
    }

    Ok(regenerated)
}
