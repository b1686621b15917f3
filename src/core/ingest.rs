//! Paper ingestion: scan the feed for a topic, gate by date, deduplicate
//! by base id, and reconcile versions against the store.
//!
//! Results arrive newest-first, so the scan stops at the first entry on or
//! before the cutoff date and never inspects the rest.

use chrono::NaiveDate;
use log::{debug, warn};

use crate::arxiv::{FeedEntry, PaperFeed};
use crate::error::{PaperboyError, Result};
use crate::store::{Paper, PaperStore, Topic};

/// How one topic's ingestion pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    Success,
    /// First run for the topic and the feed matched nothing at all,
    /// which usually means the query is malformed.
    ZeroResults,
    Error(String),
}

/// Result of one topic's ingestion pass.
#[derive(Debug)]
pub struct IngestOutcome {
    /// Papers inserted or updated this pass, newest first.
    pub papers: Vec<Paper>,
    pub status: IngestStatus,
}

/// Split a short arXiv id into base id and version.
///
/// An id is versioned when a trailing `v<digits>` sits after the last `.`,
/// so category prefixes like "cs.CV/" never confuse the split.
pub fn split_versioned_id(id: &str) -> (&str, i64) {
    if let Some(pos) = id.rfind('v') {
        let after_last_dot = id.rfind('.').is_none_or(|dot| pos > dot);
        let suffix = &id[pos + 1..];
        if after_last_dot
            && !suffix.is_empty()
            && suffix.bytes().all(|b| b.is_ascii_digit())
            && let Ok(version) = suffix.parse::<i64>()
        {
            return (&id[..pos], version);
        }
    }
    (id, 1)
}

/// Fetch new-or-updated papers for one topic.
///
/// Never fails: any feed or date-parsing problem is reported through
/// `IngestStatus::Error` so one broken topic cannot sink the others.
pub async fn fetch_new_papers(
    feed: &dyn PaperFeed,
    store: &PaperStore,
    topic: &Topic,
    since: Option<&str>,
) -> IngestOutcome {
    match scan_feed(feed, store, topic, since).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("ingestion failed for topic '{}': {}", topic.name, err);
            IngestOutcome {
                papers: Vec::new(),
                status: IngestStatus::Error(err.to_string()),
            }
        }
    }
}

async fn scan_feed(
    feed: &dyn PaperFeed,
    store: &PaperStore,
    topic: &Topic,
    since: Option<&str>,
) -> Result<IngestOutcome> {
    let cutoff = resolve_cutoff(topic, since)?;
    let page_size = feed.page_size();

    let mut papers = Vec::new();
    let mut start = 0;
    let mut seen = 0;
    let mut reached_cutoff = false;

    loop {
        let page = feed.page(&topic.query, start, page_size).await?;
        let fetched = page.entries.len();
        if fetched == 0 {
            break;
        }

        for entry in &page.entries {
            seen += 1;
            if let Some(cutoff) = cutoff
                && entry.published.date_naive() <= cutoff
            {
                reached_cutoff = true;
                break;
            }
            if let Some(paper) = reconcile(store, entry)? {
                papers.push(paper);
            }
        }

        if reached_cutoff || fetched < page_size {
            break;
        }
        start += fetched;
    }

    debug!(
        "topic '{}': scanned {} entries, {} new or updated",
        topic.name,
        seen,
        papers.len()
    );

    if seen == 0 && topic.last_run_at.is_none() {
        return Ok(IngestOutcome {
            papers,
            status: IngestStatus::ZeroResults,
        });
    }

    Ok(IngestOutcome {
        papers,
        status: IngestStatus::Success,
    })
}

/// An explicit `--since` date (dd-mm-yyyy) beats the topic's stored cutoff.
fn resolve_cutoff(topic: &Topic, since: Option<&str>) -> Result<Option<NaiveDate>> {
    match since {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%d-%m-%Y").map_err(|_| {
                PaperboyError::Config(format!("Invalid date format: {raw}. Expected dd-mm-yyyy"))
            })?;
            Ok(Some(date))
        }
        None => Ok(topic.last_run_at.map(|at| at.date_naive())),
    }
}

/// Insert a first sighting, overwrite on a strictly newer revision,
/// otherwise leave the stored row alone.
fn reconcile(store: &PaperStore, entry: &FeedEntry) -> Result<Option<Paper>> {
    let (base_id, version) = split_versioned_id(&entry.id);

    match store.paper(base_id)? {
        Some(existing) => {
            if entry.updated > existing.updated_at {
                let mut paper = paper_from_entry(base_id, version, entry);
                paper.published_at = existing.published_at;
                store.upsert_paper(&paper)?;
                debug!("updated paper {base_id} to v{version}");
                Ok(Some(paper))
            } else {
                Ok(None)
            }
        }
        None => {
            let paper = paper_from_entry(base_id, version, entry);
            store.upsert_paper(&paper)?;
            debug!("inserted paper {base_id} v{version}");
            Ok(Some(paper))
        }
    }
}

fn paper_from_entry(base_id: &str, version: i64, entry: &FeedEntry) -> Paper {
    Paper {
        id: base_id.to_string(),
        version,
        title: entry.title.clone(),
        authors: entry.authors.clone(),
        published_at: entry.published,
        updated_at: entry.updated,
        summary: entry.summary.clone(),
        pdf_url: entry.pdf_url.clone(),
    }
}
