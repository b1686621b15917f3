//! LLM relevance scoring of one paper against one topic.
//!
//! Scoring never fails: provider errors and malformed responses degrade to
//! a not-relevant verdict carrying the failure as its reasoning, so the
//! update loop keeps moving.

use crate::llm::LlmClient;
use crate::llm::response::{bool_field, extract_json, number_field, string_field};

/// Scores at or above this count as relevant when the model omits the flag.
pub const RELEVANCE_THRESHOLD: f64 = 7.0;

const SYSTEM_PROMPT: &str = r#"You are an expert research assistant. Your task is to determine if a paper is relevant to a researcher's interests.

You will be given:
1. The researcher's topic of interest
2. A paper title and abstract

Your response must be a valid JSON object with these fields:
{
  "relevance_score": <float from 0.0 to 10.0>,
  "is_relevant": <boolean>,
  "reasoning": "<brief explanation in one sentence>"
}

Scoring guidelines:
- 8.0-10.0: Highly relevant, directly addresses the research topic
- 5.0-7.9: Moderately relevant, tangential but potentially useful
- 0.0-4.9: Not relevant, outside the scope of interest

Consider:
- Does the paper directly address the research topic?
- Are the methods and findings applicable to the researcher's interests?
- Is this paper something the researcher would want to read?

Be precise and objective in your assessment."#;

/// One relevance judgement.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceVerdict {
    /// 0.0 to 10.0, clamped.
    pub relevance_score: f64,
    pub is_relevant: bool,
    pub reasoning: String,
}

impl RelevanceVerdict {
    fn fallback(reasoning: String) -> Self {
        Self {
            relevance_score: 0.0,
            is_relevant: false,
            reasoning,
        }
    }
}

/// Ask the model whether a paper matters for a topic.
pub async fn assess_relevance(
    llm: &dyn LlmClient,
    topic_description: &str,
    title: &str,
    abstract_text: &str,
) -> RelevanceVerdict {
    let prompt = format!(
        "Research Topic: \"{topic_description}\"\n\n\
         Paper Title: \"{title}\"\n\n\
         Paper Abstract: \"{abstract_text}\"\n\n\
         Evaluate the relevance of this paper to the research topic and return your assessment as JSON."
    );

    let response = match llm.generate(&prompt, Some(SYSTEM_PROMPT)).await {
        Ok(text) => text,
        Err(err) => return RelevanceVerdict::fallback(format!("Error during filtering: {err}")),
    };

    parse_verdict(&response).unwrap_or_else(|| {
        RelevanceVerdict::fallback("Failed to parse LLM response as valid JSON".to_string())
    })
}

/// `relevance_score` is required; a missing `is_relevant` is derived from
/// the threshold and a missing `reasoning` defaults to empty.
fn parse_verdict(response: &str) -> Option<RelevanceVerdict> {
    let value = extract_json(response).ok()?;
    let relevance_score = number_field(&value, "relevance_score")?.clamp(0.0, 10.0);
    let is_relevant =
        bool_field(&value, "is_relevant").unwrap_or(relevance_score >= RELEVANCE_THRESHOLD);
    let reasoning = string_field(&value, "reasoning").unwrap_or_default();

    Some(RelevanceVerdict {
        relevance_score,
        is_relevant,
        reasoning,
    })
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
        prompts: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
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
            prompt: &str,
            system_prompt: Option<&str>,
        ) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), system_prompt.map(str::to_string)));
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
    async fn test_full_response_parses() {
        let llm = ScriptedLlm::replying(
            r#"{"relevance_score": 8.5, "is_relevant": true, "reasoning": "Directly on topic."}"#,
        );

        let verdict = assess_relevance(&llm, "LLM agents", "A Paper", "An abstract").await;

        assert_eq!(verdict.relevance_score, 8.5);
        assert!(verdict.is_relevant);
        assert_eq!(verdict.reasoning, "Directly on topic.");
    }

    #[tokio::test]
    async fn test_prompt_embeds_topic_and_paper() {
        let llm = ScriptedLlm::replying(r#"{"relevance_score": 5.0}"#);

        assess_relevance(&llm, "graph neural networks", "Spectral GNNs", "We study...").await;

        let prompts = llm.prompts.lock().unwrap();
        let (prompt, system) = &prompts[0];
        assert!(prompt.contains("Research Topic: \"graph neural networks\""));
        assert!(prompt.contains("Paper Title: \"Spectral GNNs\""));
        assert!(prompt.contains("Paper Abstract: \"We study...\""));
        assert!(system.as_deref().unwrap().contains("relevance_score"));
    }

    #[tokio::test]
    async fn test_missing_flag_derived_from_threshold() {
        let llm = ScriptedLlm::replying(r#"{"relevance_score": 8.5, "reasoning": "ok"}"#);
        let verdict = assess_relevance(&llm, "t", "p", "a").await;
        assert!(verdict.is_relevant);

        let llm = ScriptedLlm::replying(r#"{"relevance_score": 4.0}"#);
        let verdict = assess_relevance(&llm, "t", "p", "a").await;
        assert!(!verdict.is_relevant);
        assert_eq!(verdict.reasoning, "");
    }

    #[tokio::test]
    async fn test_fenced_response_accepted() {
        let llm = ScriptedLlm::replying(
            "```json\n{\"relevance_score\": 9.0, \"is_relevant\": true, \"reasoning\": \"yes\"}\n```",
        );

        let verdict = assess_relevance(&llm, "t", "p", "a").await;
        assert_eq!(verdict.relevance_score, 9.0);
    }

    #[tokio::test]
    async fn test_score_clamped_to_range() {
        let llm = ScriptedLlm::replying(r#"{"relevance_score": 15.0, "is_relevant": true}"#);
        let verdict = assess_relevance(&llm, "t", "p", "a").await;
        assert_eq!(verdict.relevance_score, 10.0);

        let llm = ScriptedLlm::replying(r#"{"relevance_score": -3.0}"#);
        let verdict = assess_relevance(&llm, "t", "p", "a").await;
        assert_eq!(verdict.relevance_score, 0.0);
    }

    #[tokio::test]
    async fn test_string_typed_score_accepted() {
        let llm = ScriptedLlm::replying(r#"{"relevance_score": "7.5", "is_relevant": "true"}"#);
        let verdict = assess_relevance(&llm, "t", "p", "a").await;
        assert_eq!(verdict.relevance_score, 7.5);
        assert!(verdict.is_relevant);
    }

    #[tokio::test]
    async fn test_garbage_response_falls_back() {
        let llm = ScriptedLlm::replying("I think this paper is quite relevant!");

        let verdict = assess_relevance(&llm, "t", "p", "a").await;

        assert!(!verdict.is_relevant);
        assert_eq!(verdict.relevance_score, 0.0);
        assert_eq!(verdict.reasoning, "Failed to parse LLM response as valid JSON");
    }

    #[tokio::test]
    async fn test_missing_score_falls_back() {
        let llm = ScriptedLlm::replying(r#"{"is_relevant": true, "reasoning": "sure"}"#);

        let verdict = assess_relevance(&llm, "t", "p", "a").await;

        assert!(!verdict.is_relevant);
        assert_eq!(verdict.reasoning, "Failed to parse LLM response as valid JSON");
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::InvalidResponse(
            "empty choices".to_string(),
        ))]);

        let verdict = assess_relevance(&llm, "t", "p", "a").await;

        assert!(!verdict.is_relevant);
        assert!(verdict.reasoning.starts_with("Error during filtering:"));
        assert!(verdict.reasoning.contains("empty choices"));
    }
}
