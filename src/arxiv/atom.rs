//! Atom payload parsing for arXiv query responses

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::arxiv::client::{FeedEntry, FeedError, FeedPage};

/// Text field currently being read.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
    TotalResults,
}

/// Entry under construction; raw strings until `finish`.
#[derive(Debug, Default)]
struct Draft {
    id: String,
    title: String,
    summary: String,
    published: String,
    updated: String,
    authors: Vec<String>,
    pdf_url: Option<String>,
}

impl Draft {
    fn append(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::AuthorName | Field::TotalResults => return,
        };
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(text);
    }

    fn finish(self) -> Result<FeedEntry, FeedError> {
        if self.id.is_empty() {
            return Err(FeedError::Parse("entry missing id".to_string()));
        }

        let published = parse_timestamp(&self.published)?;
        let updated = if self.updated.is_empty() {
            published
        } else {
            parse_timestamp(&self.updated)?
        };

        Ok(FeedEntry {
            id: short_id(&self.id),
            title: squash_whitespace(&self.title),
            authors: self.authors,
            published,
            updated,
            summary: squash_whitespace(&self.summary),
            pdf_url: self.pdf_url,
        })
    }
}

/// Parse an arXiv Atom response into feed entries.
pub fn parse_feed(xml: &str) -> Result<FeedPage, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = FeedPage::default();
    let mut draft: Option<Draft> = None;
    let mut in_author = false;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => draft = Some(Draft::default()),
                b"author" => in_author = true,
                b"name" if in_author => field = Some(Field::AuthorName),
                b"id" if draft.is_some() => field = Some(Field::Id),
                b"title" if draft.is_some() => field = Some(Field::Title),
                b"summary" if draft.is_some() => field = Some(Field::Summary),
                b"published" if draft.is_some() => field = Some(Field::Published),
                b"updated" if draft.is_some() => field = Some(Field::Updated),
                b"totalResults" => field = Some(Field::TotalResults),
                b"link" => apply_link(&e, draft.as_mut())?,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link" {
                    apply_link(&e, draft.as_mut())?;
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|err| FeedError::Parse(err.to_string()))?;
                match (field, draft.as_mut()) {
                    (Some(Field::TotalResults), _) => {
                        page.total_results = text.trim().parse().ok();
                    }
                    (Some(Field::AuthorName), Some(draft)) => {
                        draft.authors.push(squash_whitespace(&text));
                    }
                    (Some(active), Some(draft)) => draft.append(active, &text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"entry" => {
                        if let Some(done) = draft.take() {
                            page.entries.push(done.finish()?);
                        }
                    }
                    b"author" => in_author = false,
                    _ => {}
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(FeedError::Parse(err.to_string())),
            _ => {}
        }
    }

    Ok(page)
}

fn apply_link(element: &BytesStart, draft: Option<&mut Draft>) -> Result<(), FeedError> {
    let Some(draft) = draft else {
        return Ok(());
    };

    let mut href = None;
    let mut title = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|err| FeedError::Parse(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| FeedError::Parse(err.to_string()))?;
        match attr.key.as_ref() {
            b"href" => href = Some(value.into_owned()),
            b"title" => title = Some(value.into_owned()),
            _ => {}
        }
    }

    if title.as_deref() == Some("pdf") {
        draft.pdf_url = href;
    }
    Ok(())
}

/// Strip the abs URL prefix down to the short versioned id.
fn short_id(raw: &str) -> String {
    match raw.rsplit_once("/abs/") {
        Some((_, id)) => id.to_string(),
        None => raw.to_string(),
    }
}

/// Collapse runs of whitespace; arXiv hard-wraps titles and abstracts.
fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, FeedError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| FeedError::Parse(format!("bad timestamp '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <link href="http://arxiv.org/api/query?search_query=cat:cs.AI" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query: search_query=cat:cs.AI</title>
  <id>http://arxiv.org/api/feeds</id>
  <updated>2024-01-02T00:00:00-05:00</updated>
  <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">362</opensearch:totalResults>
  <opensearch:startIndex xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">0</opensearch:startIndex>
  <entry>
    <id>http://arxiv.org/abs/2310.00012v2</id>
    <updated>2023-10-02T17:59:59Z</updated>
    <published>2023-09-29T12:00:00Z</published>
    <title>Retrieval Augmented
  Planning &amp; Control</title>
    <summary>  We study retrieval for
  long-horizon agents.</summary>
    <author>
      <name>Jane Doe</name>
    </author>
    <author>
      <name>John Smith</name>
    </author>
    <link href="http://arxiv.org/abs/2310.00012v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2310.00012v2" rel="related" type="application/pdf"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/cs.AI/0101001v3</id>
    <updated>2023-09-28T08:00:00Z</updated>
    <published>2023-09-28T08:00:00Z</published>
    <title>Older Style Identifiers</title>
    <summary>Short abstract.</summary>
    <author>
      <name>Ada Lovelace</name>
    </author>
    <link href="http://arxiv.org/abs/cs.AI/0101001v3" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_sample_feed() {
        let page = parse_feed(SAMPLE_FEED).unwrap();

        assert_eq!(page.total_results, Some(362));
        assert_eq!(page.entries.len(), 2);

        let first = &page.entries[0];
        assert_eq!(first.id, "2310.00012v2");
        assert_eq!(first.title, "Retrieval Augmented Planning & Control");
        assert_eq!(first.summary, "We study retrieval for long-horizon agents.");
        assert_eq!(first.authors, vec!["Jane Doe", "John Smith"]);
        assert_eq!(
            first.pdf_url.as_deref(),
            Some("http://arxiv.org/pdf/2310.00012v2")
        );
        assert_eq!(first.published.to_rfc3339(), "2023-09-29T12:00:00+00:00");
        assert_eq!(first.updated.to_rfc3339(), "2023-10-02T17:59:59+00:00");
    }

    #[test]
    fn test_parse_old_style_id() {
        let page = parse_feed(SAMPLE_FEED).unwrap();
        let second = &page.entries[1];

        assert_eq!(second.id, "cs.AI/0101001v3");
        assert_eq!(second.authors, vec!["Ada Lovelace"]);
        assert!(second.pdf_url.is_none());
    }

    #[test]
    fn test_parse_empty_feed() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <opensearch:totalResults xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">0</opensearch:totalResults>
</feed>"#;

        let page = parse_feed(xml).unwrap();
        assert_eq!(page.total_results, Some(0));
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let xml = r#"<feed><entry>
            <id>http://arxiv.org/abs/2310.00012v1</id>
            <published>yesterday</published>
        </entry></feed>"#;

        let err = parse_feed(xml).unwrap_err();
        assert!(err.to_string().contains("bad timestamp"));
    }

    #[test]
    fn test_entry_without_id_is_an_error() {
        let xml = r#"<feed><entry>
            <published>2023-09-29T12:00:00Z</published>
        </entry></feed>"#;

        let err = parse_feed(xml).unwrap_err();
        assert!(err.to_string().contains("missing id"));
    }

    #[test]
    fn test_updated_defaults_to_published() {
        let xml = r#"<feed><entry>
            <id>http://arxiv.org/abs/2310.00099v1</id>
            <published>2023-09-29T12:00:00Z</published>
        </entry></feed>"#;

        let page = parse_feed(xml).unwrap();
        assert_eq!(page.entries[0].updated, page.entries[0].published);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("http://arxiv.org/abs/2310.00012v2"), "2310.00012v2");
        assert_eq!(
            short_id("http://arxiv.org/abs/cs.AI/0101001v3"),
            "cs.AI/0101001v3"
        );
        assert_eq!(short_id("2310.00012v2"), "2310.00012v2");
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("a\n  b\tc "), "a b c");
        assert_eq!(squash_whitespace(""), "");
    }
}
