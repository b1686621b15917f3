//! Structured paper summaries for the digest.
//!
//! Like relevance scoring this never fails outright: a malformed response
//! or provider error yields a placeholder summary tagged accordingly.

use serde_json::Value;

use crate::llm::LlmClient;
use crate::llm::response::{extract_json, string_field};

/// Tags are truncated to this many entries.
const MAX_TAGS: usize = 5;

const SYSTEM_PROMPT: &str = r#"You are an expert research summarizer. Your task is to create concise, informative summaries of academic papers for researchers.

Focus on extracting the most important information that would help a researcher quickly understand:
1. What the paper is about in one sentence
2. The key contribution or finding
3. The methodology used
4. Relevant keywords/tags for categorization

Your response must be a valid JSON object with these fields:
{
  "tldr": "<one sentence summary>",
  "key_contribution": "<main contribution or finding in 2-3 sentences>",
  "methodology": "<brief description of methods used in 2-3 sentences>",
  "tags": ["<keyword1>", "<keyword2>", "<keyword3>", "<keyword4>", "<keyword5>"]
}

Keep summaries concise but informative. Focus on what makes this paper unique or valuable."#;

/// Structured summary of one paper.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperSummary {
    pub tldr: String,
    pub key_contribution: String,
    pub methodology: Option<String>,
    /// Lowercase labels, at most five.
    pub tags: Vec<String>,
}

impl PaperSummary {
    /// Digest text stored on the link and rendered in reports.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "**TL;DR**: {}\n\n**Key Contribution**: {}\n\n",
            self.tldr, self.key_contribution
        );
        if let Some(methodology) = &self.methodology {
            out.push_str(&format!("**Methodology**: {methodology}\n\n"));
        }
        out
    }

    fn parse_failed() -> Self {
        Self {
            tldr: "Failed to generate summary".to_string(),
            key_contribution: "Unable to extract key contribution due to parsing error".to_string(),
            methodology: Some("Unable to extract methodology due to parsing error".to_string()),
            tags: vec!["error".to_string(), "parsing-failed".to_string()],
        }
    }

    fn generation_failed(message: &str) -> Self {
        Self {
            tldr: "Error generating summary".to_string(),
            key_contribution: format!("Error during summarization: {message}"),
            methodology: Some("Unable to extract methodology due to error".to_string()),
            tags: vec!["error".to_string(), "generation-failed".to_string()],
        }
    }
}

/// Ask the model for a structured summary of one paper.
pub async fn summarize_paper(
    llm: &dyn LlmClient,
    title: &str,
    abstract_text: &str,
) -> PaperSummary {
    let prompt = format!(
        "Paper Title: \"{title}\"\n\n\
         Paper Abstract: \"{abstract_text}\"\n\n\
         Create a comprehensive summary of this paper and return your response as JSON."
    );

    let response = match llm.generate(&prompt, Some(SYSTEM_PROMPT)).await {
        Ok(text) => text,
        Err(err) => return PaperSummary::generation_failed(&err.to_string()),
    };

    parse_summary(&response).unwrap_or_else(PaperSummary::parse_failed)
}

/// `tldr`, `key_contribution`, and `tags` are required; `methodology`
/// may be omitted.
fn parse_summary(response: &str) -> Option<PaperSummary> {
    let value = extract_json(response).ok()?;

    Some(PaperSummary {
        tldr: string_field(&value, "tldr")?,
        key_contribution: string_field(&value, "key_contribution")?,
        methodology: string_field(&value, "methodology"),
        tags: normalize_tags(value.get("tags")?),
    })
}

/// Models return tags as a list, a JSON-encoded list, or a plain
/// delimited string. Accept all three.
fn normalize_tags(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items.iter().map(tag_text).collect(),
        Value::String(s) => match serde_json::from_str::<Vec<String>>(s) {
            Ok(items) => items,
            Err(_) => s.replace(',', ";").split(';').map(str::to_string).collect(),
        },
        other => vec![tag_text(other)],
    };

    raw.iter()
        .take(MAX_TAGS)
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn tag_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }

        fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(
            &self,
            _prompt: &str,
            _system_prompt: Option<&str>,
        ) -> Result<String, LlmError> {
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

    #[tokio::test]
    async fn test_full_summary_parses() {
        let llm = ScriptedLlm::replying(
            r#"{
                "tldr": "A new planner.",
                "key_contribution": "Plans twice as fast.",
                "methodology": "Benchmarked on ALFWorld.",
                "tags": ["Planning", "Agents", "benchmarks"]
            }"#,
        );

        let summary = summarize_paper(&llm, "A Paper", "An abstract").await;

        assert_eq!(summary.tldr, "A new planner.");
        assert_eq!(summary.key_contribution, "Plans twice as fast.");
        assert_eq!(summary.methodology.as_deref(), Some("Benchmarked on ALFWorld."));
        assert_eq!(summary.tags, vec!["planning", "agents", "benchmarks"]);
    }

    #[tokio::test]
    async fn test_fenced_summary_parses() {
        let llm = ScriptedLlm::replying(
            "```json\n{\"tldr\": \"x\", \"key_contribution\": \"y\", \"tags\": [\"a\"]}\n```",
        );

        let summary = summarize_paper(&llm, "t", "a").await;
        assert_eq!(summary.tldr, "x");
        assert!(summary.methodology.is_none());
    }

    #[tokio::test]
    async fn test_tags_from_delimited_string() {
        let llm = ScriptedLlm::replying(
            r#"{"tldr": "x", "key_contribution": "y", "tags": "Agents, Planning; RL"}"#,
        );

        let summary = summarize_paper(&llm, "t", "a").await;
        assert_eq!(summary.tags, vec!["agents", "planning", "rl"]);
    }

    #[tokio::test]
    async fn test_tags_from_json_encoded_string() {
        let llm = ScriptedLlm::replying(
            r#"{"tldr": "x", "key_contribution": "y", "tags": "[\"NLP\", \"Parsing\"]"}"#,
        );

        let summary = summarize_paper(&llm, "t", "a").await;
        assert_eq!(summary.tags, vec!["nlp", "parsing"]);
    }

    #[tokio::test]
    async fn test_tags_truncated_to_five() {
        let llm = ScriptedLlm::replying(
            r#"{"tldr": "x", "key_contribution": "y", "tags": ["a","b","c","d","e","f","g"]}"#,
        );

        let summary = summarize_paper(&llm, "t", "a").await;
        assert_eq!(summary.tags.len(), 5);
        assert_eq!(summary.tags[4], "e");
    }

    #[tokio::test]
    async fn test_missing_tags_is_parse_failure() {
        let llm = ScriptedLlm::replying(r#"{"tldr": "x", "key_contribution": "y"}"#);

        let summary = summarize_paper(&llm, "t", "a").await;
        assert_eq!(summary.tldr, "Failed to generate summary");
        assert_eq!(summary.tags, vec!["error", "parsing-failed"]);
    }

    #[tokio::test]
    async fn test_garbage_yields_parse_placeholder() {
        let llm = ScriptedLlm::replying("Here is my summary: the paper is nice.");

        let summary = summarize_paper(&llm, "t", "a").await;

        assert_eq!(summary.tldr, "Failed to generate summary");
        assert_eq!(summary.tags, vec!["error", "parsing-failed"]);
        assert!(summary.methodology.is_some());
    }

    #[tokio::test]
    async fn test_provider_error_yields_generation_placeholder() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::InvalidResponse("boom".to_string()))]);

        let summary = summarize_paper(&llm, "t", "a").await;

        assert_eq!(summary.tldr, "Error generating summary");
        assert!(summary.key_contribution.contains("boom"));
        assert_eq!(summary.tags, vec!["error", "generation-failed"]);
    }

    #[test]
    fn test_markdown_layout() {
        let summary = PaperSummary {
            tldr: "One sentence.".to_string(),
            key_contribution: "The contribution.".to_string(),
            methodology: Some("The method.".to_string()),
            tags: vec!["a".to_string()],
        };

        assert_eq!(
            summary.to_markdown(),
            "**TL;DR**: One sentence.\n\n**Key Contribution**: The contribution.\n\n**Methodology**: The method.\n\n"
        );
    }

    #[test]
    fn test_markdown_omits_missing_methodology() {
        let summary = PaperSummary {
            tldr: "One sentence.".to_string(),
            key_contribution: "The contribution.".to_string(),
            methodology: None,
            tags: Vec::new(),
        };

        let markdown = summary.to_markdown();
        assert!(!markdown.contains("**Methodology**"));
        assert!(markdown.ends_with("The contribution.\n\n"));
    }
}
