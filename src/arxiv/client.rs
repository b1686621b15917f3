//! Paper feed abstraction and the arXiv API client
//!
//! Ingestion only sees the [`PaperFeed`] trait: one page of results at a
//! time, newest submissions first. The concrete client talks to the arXiv
//! query API with polite inter-request spacing and bounded retries.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::time::{Duration, Instant};

use crate::arxiv::atom::parse_feed;

/// arXiv query endpoint
pub const ARXIV_BASE_URL: &str = "https://export.arxiv.org/api/query";

/// One paper record as it appears in the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Short versioned id, e.g. "2310.00012v2"
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Abstract text
    pub summary: String,
    pub pdf_url: Option<String>,
}

/// One page of feed results.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    /// Total matches reported by the feed for the whole query, if stated
    pub total_results: Option<u64>,
    pub entries: Vec<FeedEntry>,
}

/// Errors from the paper feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Feed returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed feed: {0}")]
    Parse(String),
}

impl FeedError {
    /// Worth another attempt: connectivity trouble or server-side failures.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Network(_) => true,
            FeedError::Status { status, .. } => *status >= 500,
            FeedError::Parse(_) => false,
        }
    }
}

/// A reverse-chronological, paged source of paper records.
#[async_trait]
pub trait PaperFeed: Send + Sync {
    /// Fetch one page of results for `query`, newest submissions first.
    /// An empty page means the feed is exhausted.
    async fn page(&self, query: &str, start: usize, count: usize)
    -> Result<FeedPage, FeedError>;

    /// First few entries for a query, for validation and previews.
    async fn preview(&self, query: &str, count: usize) -> Result<Vec<FeedEntry>, FeedError> {
        Ok(self.page(query, 0, count).await?.entries)
    }

    /// Results to request per page when scanning.
    fn page_size(&self) -> usize {
        100
    }
}

/// Configuration for the arXiv client.
#[derive(Debug, Clone)]
pub struct ArxivConfig {
    pub base_url: String,
    /// Results requested per page
    pub page_size: usize,
    /// Spacing between consecutive requests (the API asks for 3s)
    pub request_delay: Duration,
    pub timeout: Duration,
    /// Attempts per page before the error surfaces
    pub retries: u32,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: ARXIV_BASE_URL.to_string(),
            page_size: 100,
            request_delay: Duration::from_secs(3),
            timeout: Duration::from_secs(30),
            retries: 3,
        }
    }
}

/// HTTP client for the arXiv query API.
#[derive(Debug)]
pub struct ArxivClient {
    client: Client,
    config: ArxivConfig,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivClient {
    pub fn new(config: ArxivConfig) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Sleep out the remainder of the polite inter-request spacing.
    async fn pace(&self) {
        let wait = {
            let last = self.last_request.lock().unwrap();
            match *last {
                Some(prev) => self
                    .config
                    .request_delay
                    .saturating_sub(Instant::now().duration_since(prev)),
                None => Duration::ZERO,
            }
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *self.last_request.lock().unwrap() = Some(Instant::now());
    }

    async fn fetch_page(
        &self,
        query: &str,
        start: usize,
        count: usize,
    ) -> Result<FeedPage, FeedError> {
        let start_param = start.to_string();
        let count_param = count.to_string();
        let params = [
            ("search_query", query),
            ("start", start_param.as_str()),
            ("max_results", count_param.as_str()),
            ("sortBy", "submittedDate"),
            ("sortOrder", "descending"),
        ];

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FeedError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        parse_feed(&body)
    }
}

#[async_trait]
impl PaperFeed for ArxivClient {
    async fn page(
        &self,
        query: &str,
        start: usize,
        count: usize,
    ) -> Result<FeedPage, FeedError> {
        self.pace().await;

        let mut last_err = None;
        for attempt in 1..=self.config.retries {
            match self.fetch_page(query, start, count).await {
                Ok(page) => return Ok(page),
                Err(err) if attempt < self.config.retries && err.is_transient() => {
                    log::warn!(
                        "arXiv request failed (attempt {attempt}/{}): {err}",
                        self.config.retries
                    );
                    tokio::time::sleep(self.config.request_delay).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err
            .unwrap_or_else(|| FeedError::Parse("request retries exhausted".to_string())))
    }

    fn page_size(&self) -> usize {
        self.config.page_size
    }
}
