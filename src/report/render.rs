//! Digest report rendering with Handlebars.
//!
//! Both formats render from the same per-paper context. Derived fields
//! (1-based index, formatted score, joined author list, digest with HTML
//! line breaks) are computed up front because the templates only
//! substitute and loop.

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{PaperboyError, Result};
use crate::store::{Paper, PaperTopicLink, Topic};

const MARKDOWN_TEMPLATE: &str = r#"# Research Digest: {{name}}

**Description:** {{description}}

*Generated on: {{generated_date}}*

---

{{#each papers}}
## {{index}}. {{title}}

**Authors:** {{authors}}
**Published:** {{published_date}}
**Relevance Score:** {{relevance_score}}/10
**arXiv ID:** [{{arxiv_id}}]({{pdf_url}})

{{digest}}

{{#if tags_joined}}
**Tags:** {{tags_joined}}
{{/if}}

---

{{/each}}
{{#unless papers}}
*No relevant papers found in this digest.*
{{/unless}}
"#;

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Research Digest: {{name}}</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 20px; }
        .header { border-bottom: 2px solid #e1e5e9; padding-bottom: 20px; margin-bottom: 30px; }
        .paper { border: 1px solid #e1e5e9; border-radius: 8px; padding: 20px; margin-bottom: 20px; background: #f8f9fa; }
        .paper h3 { color: #2c3e50; margin-top: 0; }
        .meta { color: #6c757d; font-size: 0.9em; margin-bottom: 15px; }
        .relevance { background: #28a745; color: white; padding: 2px 8px; border-radius: 12px; font-size: 0.8em; }
        .digest { margin: 15px 0; }
        .tags { margin-top: 15px; }
        .tag { background: #007bff; color: white; padding: 2px 8px; border-radius: 12px; font-size: 0.8em; margin-right: 5px; }
    </style>
</head>
<body>
    <div class="header">
        <h1>Research Digest: {{name}}</h1>
        <p><strong>Description:</strong> {{description}}</p>
        <p><em>Generated on: {{generated_date}}</em></p>
    </div>

{{#each papers}}
    <div class="paper">
        <h3>{{index}}. {{title}}</h3>
        <div class="meta">
            <p><strong>Authors:</strong> {{authors}}<br>
            <strong>Published:</strong> {{published_date}}<br>
            <strong>arXiv ID:</strong> <a href="{{pdf_url}}">{{arxiv_id}}</a><br>
            <span class="relevance">Relevance: {{relevance_score}}/10</span></p>
        </div>
        <div class="digest">
            {{digest_html}}
        </div>
{{#if tags}}
        <div class="tags">
{{#each tags}}
            <span class="tag">{{this}}</span>
{{/each}}
        </div>
{{/if}}
    </div>
{{/each}}
{{#unless papers}}
    <div class="paper">
        <p>No relevant papers found in this digest.</p>
    </div>
{{/unless}}
</body>
</html>
"#;

#[derive(Serialize)]
struct DigestContext {
    name: String,
    description: String,
    generated_date: String,
    papers: Vec<PaperContext>,
}

#[derive(Serialize)]
struct PaperContext {
    index: usize,
    title: String,
    authors: String,
    published_date: String,
    relevance_score: String,
    arxiv_id: String,
    pdf_url: String,
    digest: String,
    digest_html: String,
    tags: Vec<String>,
    tags_joined: String,
}

impl DigestContext {
    fn build(topic: &Topic, entries: &[(Paper, PaperTopicLink)]) -> Self {
        let generated_date = entries
            .first()
            .map(|(_, link)| format_generated(&link.created_at))
            .unwrap_or_else(|| "Unknown".to_string());

        let papers = entries
            .iter()
            .enumerate()
            .map(|(i, (paper, link))| {
                let digest = link.digest.clone().unwrap_or_default();
                PaperContext {
                    index: i + 1,
                    title: paper.title.clone(),
                    authors: paper.authors.join(", "),
                    published_date: paper.published_at.format("%Y-%m-%d").to_string(),
                    relevance_score: format!("{:.1}", link.relevance_score),
                    arxiv_id: paper.id.clone(),
                    pdf_url: paper
                        .pdf_url
                        .clone()
                        .unwrap_or_else(|| format!("https://arxiv.org/abs/{}", paper.id)),
                    digest_html: digest.replace('\n', "<br>"),
                    digest,
                    tags: link.tags.clone(),
                    tags_joined: link.tags.join(", "),
                }
            })
            .collect();

        Self {
            name: topic.name.clone(),
            description: topic.description.clone(),
            generated_date,
            papers,
        }
    }
}

fn format_generated(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Renders digest reports for a topic's relevant papers.
pub struct DigestRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for DigestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Markdown must pass through untouched; the HTML template carries
        // its own markup, so entity escaping stays off for both.
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render the markdown digest for `topic`.
    pub fn markdown(&self, topic: &Topic, entries: &[(Paper, PaperTopicLink)]) -> Result<String> {
        self.render(MARKDOWN_TEMPLATE, topic, entries)
    }

    /// Render the standalone HTML digest for `topic`.
    pub fn html(&self, topic: &Topic, entries: &[(Paper, PaperTopicLink)]) -> Result<String> {
        self.render(HTML_TEMPLATE, topic, entries)
    }

    fn render(
        &self,
        template: &str,
        topic: &Topic,
        entries: &[(Paper, PaperTopicLink)],
    ) -> Result<String> {
        let context = DigestContext::build(topic, entries);
        self.handlebars
            .render_template(template, &context)
            .map_err(|e| PaperboyError::Template(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn sample_topic() -> Topic {
        Topic {
            id: 1,
            name: "LLM Agents".to_string(),
            description: "Planning and tool use".to_string(),
            query: "cat:cs.AI".to_string(),
            last_run_at: None,
            active: true,
            created_at: ts("2024-01-01T00:00:00Z"),
        }
    }

    fn sample_entry(id: &str, title: &str, score: f64) -> (Paper, PaperTopicLink) {
        let paper = Paper {
            id: id.to_string(),
            version: 1,
            title: title.to_string(),
            authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
            published_at: ts("2024-01-09T12:00:00Z"),
            updated_at: ts("2024-01-09T12:00:00Z"),
            summary: "An abstract.".to_string(),
            pdf_url: Some(format!("https://arxiv.org/pdf/{id}")),
        };
        let link = PaperTopicLink {
            paper_id: id.to_string(),
            topic_id: 1,
            relevance_score: score,
            is_relevant: true,
            reasoning: "on topic".to_string(),
            digest: Some("**TL;DR**: Fast.\n\n**Key Contribution**: New planner.".to_string()),
            tags: vec!["agents".to_string(), "planning".to_string()],
            created_at: ts("2024-01-10T08:30:00Z"),
        };
        (paper, link)
    }

    #[test]
    fn test_markdown_digest() {
        let renderer = DigestRenderer::new();
        let entries = vec![
            sample_entry("2401.00001", "First Paper", 8.5),
            sample_entry("2401.00002", "Second Paper", 7.0),
        ];

        let output = renderer.markdown(&sample_topic(), &entries).unwrap();

        assert!(output.starts_with("# Research Digest: LLM Agents"));
        assert!(output.contains("**Description:** Planning and tool use"));
        assert!(output.contains("*Generated on: 2024-01-10 08:30*"));
        assert!(output.contains("## 1. First Paper"));
        assert!(output.contains("## 2. Second Paper"));
        assert!(output.contains("**Authors:** Ada Lovelace, Alan Turing"));
        assert!(output.contains("**Published:** 2024-01-09"));
        assert!(output.contains("**Relevance Score:** 8.5/10"));
        assert!(output.contains("**arXiv ID:** [2401.00001](https://arxiv.org/pdf/2401.00001)"));
        assert!(output.contains("**TL;DR**: Fast."));
        assert!(output.contains("**Tags:** agents, planning"));
    }

    #[test]
    fn test_markdown_orders_papers_as_given() {
        let renderer = DigestRenderer::new();
        let entries = vec![
            sample_entry("2401.00001", "First Paper", 8.5),
            sample_entry("2401.00002", "Second Paper", 7.0),
        ];

        let output = renderer.markdown(&sample_topic(), &entries).unwrap();
        let first = output.find("## 1. First Paper").unwrap();
        let second = output.find("## 2. Second Paper").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_markdown_empty_digest() {
        let renderer = DigestRenderer::new();
        let output = renderer.markdown(&sample_topic(), &[]).unwrap();

        assert!(output.contains("*No relevant papers found in this digest.*"));
        assert!(output.contains("*Generated on: Unknown*"));
        assert!(!output.contains("## 1."));
    }

    #[test]
    fn test_markdown_omits_empty_tags_line() {
        let renderer = DigestRenderer::new();
        let (paper, mut link) = sample_entry("2401.00001", "First Paper", 8.5);
        link.tags = Vec::new();

        let output = renderer.markdown(&sample_topic(), &[(paper, link)]).unwrap();
        assert!(!output.contains("**Tags:**"));
    }

    #[test]
    fn test_markdown_score_shows_one_decimal() {
        let renderer = DigestRenderer::new();
        let entries = vec![sample_entry("2401.00001", "First Paper", 7.0)];

        let output = renderer.markdown(&sample_topic(), &entries).unwrap();
        assert!(output.contains("**Relevance Score:** 7.0/10"));
    }

    #[test]
    fn test_pdf_url_falls_back_to_abstract_page() {
        let renderer = DigestRenderer::new();
        let (mut paper, link) = sample_entry("2401.00001", "First Paper", 8.5);
        paper.pdf_url = None;

        let output = renderer.markdown(&sample_topic(), &[(paper, link)]).unwrap();
        assert!(output.contains("[2401.00001](https://arxiv.org/abs/2401.00001)"));
    }

    #[test]
    fn test_html_digest() {
        let renderer = DigestRenderer::new();
        let entries = vec![sample_entry("2401.00001", "First Paper", 8.5)];

        let output = renderer.html(&sample_topic(), &entries).unwrap();

        assert!(output.starts_with("<!DOCTYPE html>"));
        assert!(output.contains("<title>Research Digest: LLM Agents</title>"));
        assert!(output.contains("<h3>1. First Paper</h3>"));
        assert!(output.contains("<strong>Authors:</strong> Ada Lovelace, Alan Turing<br>"));
        assert!(output.contains(r#"<a href="https://arxiv.org/pdf/2401.00001">2401.00001</a>"#));
        assert!(output.contains(r#"<span class="relevance">Relevance: 8.5/10</span>"#));
        assert!(output.contains(r#"<span class="tag">agents</span>"#));
        assert!(output.contains(r#"<span class="tag">planning</span>"#));
    }

    #[test]
    fn test_html_digest_converts_newlines() {
        let renderer = DigestRenderer::new();
        let entries = vec![sample_entry("2401.00001", "First Paper", 8.5)];

        let output = renderer.html(&sample_topic(), &entries).unwrap();
        assert!(output.contains("**TL;DR**: Fast.<br><br>**Key Contribution**: New planner."));
    }

    #[test]
    fn test_html_empty_digest() {
        let renderer = DigestRenderer::new();
        let output = renderer.html(&sample_topic(), &[]).unwrap();

        assert!(output.contains("<p>No relevant papers found in this digest.</p>"));
        assert!(!output.contains("<h3>"));
    }
}
