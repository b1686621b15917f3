//! Natural-language topic descriptions to validated arXiv query strings.

use log::{info, warn};

use crate::arxiv::PaperFeed;
use crate::error::{PaperboyError, Result};
use crate::llm::LlmClient;

/// Generation plus validation attempts before giving up.
const MAX_ATTEMPTS: u32 = 3;

/// Results requested when probing a candidate query.
const PROBE_COUNT: usize = 1;

const SYSTEM_PROMPT: &str = r#"You are an expert in the arXiv API query syntax.
Convert the user's research topic into a SINGLE line raw query string.

Syntax Rules:
- Fields: ti (Title), abs (Abstract), cat (Category), au (Author).
- Operators: AND, OR, ANDNOT.
- Grouping: Use parentheses (...) for logic.
- Exact phrases: Use double quotes "..." for multi-word terms.

Common Categories:
- cs.AI (Artificial Intelligence), cs.CL (Computation & Language), cs.LG (Machine Learning)
- cs.SE (Software Eng), stat.ML (Machine Learning), cs.CV (Computer Vision)

Example:
User: "Large language models for medical diagnosis"
Output: (ti:"large language model" OR abs:"large language model" OR ti:LLM) AND (ti:medical OR abs:diagnosis) AND (cat:cs.CL OR cat:cs.AI)

Return ONLY the query string. No markdown, no explanations."#;

/// Translate a topic description into an arXiv query the feed accepts.
///
/// Each attempt generates a fresh candidate and probes the feed with it;
/// LLM failures propagate immediately, probe failures retry.
pub async fn translate_topic(
    llm: &dyn LlmClient,
    feed: &dyn PaperFeed,
    description: &str,
) -> Result<String> {
    let mut last_err = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        let raw = llm.generate(description, Some(SYSTEM_PROMPT)).await?;
        let query = raw.trim();

        match validate_query(feed, query).await {
            Ok(()) => {
                info!("generated query for '{description}': {query}");
                return Ok(query.to_string());
            }
            Err(err) => {
                warn!("query validation failed (attempt {attempt}/{MAX_ATTEMPTS}): {err}");
                last_err = err.to_string();
            }
        }
    }

    Err(PaperboyError::QueryValidation(format!(
        "no valid query after {MAX_ATTEMPTS} attempts: {last_err}"
    )))
}

/// Probe the feed with a query; any feed error means the query is unusable.
pub async fn validate_query(feed: &dyn PaperFeed, query: &str) -> Result<()> {
    feed.preview(query, PROBE_COUNT)
        .await
        .map_err(|err| PaperboyError::QueryValidation(format!("arXiv rejected query: {err}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arxiv::{FeedError, FeedPage};
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::result::Result;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(
            &self,
            _prompt: &str,
            _system_prompt: Option<&str>,
        ) -> Result<String, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct ScriptedFeed {
        pages: Mutex<VecDeque<Result<FeedPage, FeedError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedFeed {
        fn new(pages: Vec<Result<FeedPage, FeedError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn rejected() -> Result<FeedPage, FeedError> {
            Err(FeedError::Status {
                status: 400,
                message: "malformed query".to_string(),
            })
        }
    }

    #[async_trait]
    impl PaperFeed for ScriptedFeed {
        async fn page(
            &self,
            query: &str,
            _start: usize,
            _count: usize,
        ) -> Result<FeedPage, FeedError> {
            self.queries.lock().unwrap().push(query.to_string());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(FeedPage::default()))
        }
    }

    #[tokio::test]
    async fn test_first_candidate_accepted() {
        let llm = ScriptedLlm::new(vec![Ok("cat:cs.AI AND abs:agent\n".to_string())]);
        let feed = ScriptedFeed::new(vec![Ok(FeedPage::default())]);

        let query = translate_topic(&llm, &feed, "LLM agents").await.unwrap();

        assert_eq!(query, "cat:cs.AI AND abs:agent");
        assert_eq!(llm.calls(), 1);
        assert_eq!(feed.queries.lock().unwrap()[0], "cat:cs.AI AND abs:agent");
    }

    #[tokio::test]
    async fn test_retries_after_probe_rejection() {
        let llm = ScriptedLlm::new(vec![
            Ok("cat:cs.XX".to_string()),
            Ok("cat:cs.AI".to_string()),
        ]);
        let feed = ScriptedFeed::new(vec![ScriptedFeed::rejected(), Ok(FeedPage::default())]);

        let query = translate_topic(&llm, &feed, "agents").await.unwrap();

        assert_eq!(query, "cat:cs.AI");
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let llm = ScriptedLlm::new(vec![
            Ok("bad1".to_string()),
            Ok("bad2".to_string()),
            Ok("bad3".to_string()),
        ]);
        let feed = ScriptedFeed::new(vec![
            ScriptedFeed::rejected(),
            ScriptedFeed::rejected(),
            ScriptedFeed::rejected(),
        ]);

        let err = translate_topic(&llm, &feed, "agents").await.unwrap_err();

        assert!(matches!(err, PaperboyError::QueryValidation(_)));
        assert!(err.to_string().contains("3 attempts"));
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn test_llm_failure_propagates_immediately() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::InvalidResponse("nope".to_string()))]);
        let feed = ScriptedFeed::new(vec![]);

        let err = translate_topic(&llm, &feed, "agents").await.unwrap_err();

        assert!(matches!(err, PaperboyError::Llm(_)));
        assert_eq!(llm.calls(), 1);
        assert!(feed.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_query_maps_feed_error() {
        let feed = ScriptedFeed::new(vec![ScriptedFeed::rejected()]);

        let err = validate_query(&feed, "cat:cs.XX").await.unwrap_err();

        assert!(err.to_string().contains("arXiv rejected query"));
        assert!(err.to_string().contains("400"));
    }
}
