//! SQLite persistence for topics, papers, and topic links.
//!
//! One database file holds three tables mirroring the record types in
//! `records`. Papers are keyed by base arXiv id so a newer version updates
//! the existing row in place; links are keyed by (paper_id, topic_id) so a
//! pair is scored at most once unless a run forces reprocessing.

use crate::error::{PaperboyError, Result};
use crate::store::records::{Paper, PaperTopicLink, Topic};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use std::fs;
use std::path::Path;

/// Row counts for the status overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub topics: usize,
    pub papers: usize,
    pub links: usize,
    pub relevant: usize,
}

/// PaperStore wraps the SQLite database holding all durable state.
pub struct PaperStore {
    db: Connection,
}

impl PaperStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        Self::init_schema(&db)?;
        Ok(Self { db })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        Self::init_schema(&db)?;
        Ok(Self { db })
    }

    /// Initialize the SQLite schema.
    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                query TEXT NOT NULL,
                last_run_at TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS papers (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                title TEXT NOT NULL,
                authors TEXT NOT NULL,
                published_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                summary TEXT NOT NULL,
                pdf_url TEXT
            );

            CREATE TABLE IF NOT EXISTS paper_topic_links (
                paper_id TEXT NOT NULL,
                topic_id INTEGER NOT NULL,
                relevance_score REAL NOT NULL,
                is_relevant INTEGER NOT NULL,
                reasoning TEXT NOT NULL,
                digest TEXT,
                tags TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (paper_id, topic_id)
            );

            CREATE INDEX IF NOT EXISTS idx_links_topic ON paper_topic_links(topic_id);
            CREATE INDEX IF NOT EXISTS idx_links_relevant ON paper_topic_links(topic_id, is_relevant);
            CREATE INDEX IF NOT EXISTS idx_papers_published ON papers(published_at);
            "#,
        )?;

        Ok(())
    }

    /// Create a topic and return it with its assigned id.
    pub fn add_topic(&self, name: &str, description: &str, query: &str) -> Result<Topic> {
        let created_at = Utc::now();
        self.db.execute(
            "INSERT INTO topics (name, description, query, active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
            params![name, description, query, created_at],
        )?;

        Ok(Topic {
            id: self.db.last_insert_rowid(),
            name: name.to_string(),
            description: description.to_string(),
            query: query.to_string(),
            last_run_at: None,
            active: true,
            created_at,
        })
    }

    /// Get a topic by id.
    pub fn topic(&self, id: i64) -> Result<Option<Topic>> {
        let result = self
            .db
            .query_row(&format!("{TOPIC_SELECT} WHERE id = ?1"), [id], topic_from_row);

        match result {
            Ok(topic) => Ok(Some(topic)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a topic by its unique name.
    pub fn topic_by_name(&self, name: &str) -> Result<Option<Topic>> {
        let result =
            self.db
                .query_row(&format!("{TOPIC_SELECT} WHERE name = ?1"), [name], topic_from_row);

        match result {
            Ok(topic) => Ok(Some(topic)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all topics.
    pub fn topics(&self) -> Result<Vec<Topic>> {
        let mut stmt = self.db.prepare(&format!("{TOPIC_SELECT} ORDER BY id"))?;
        let rows = stmt.query_map([], topic_from_row)?;
        collect(rows)
    }

    /// List topics eligible for update runs.
    pub fn active_topics(&self) -> Result<Vec<Topic>> {
        let mut stmt = self
            .db
            .prepare(&format!("{TOPIC_SELECT} WHERE active = 1 ORDER BY id"))?;
        let rows = stmt.query_map([], topic_from_row)?;
        collect(rows)
    }

    /// Persist edits to an existing topic.
    pub fn update_topic(&self, topic: &Topic) -> Result<()> {
        let changed = self.db.execute(
            "UPDATE topics SET name = ?1, description = ?2, query = ?3, last_run_at = ?4, active = ?5 WHERE id = ?6",
            params![
                topic.name,
                topic.description,
                topic.query,
                topic.last_run_at,
                topic.active,
                topic.id
            ],
        )?;

        if changed == 0 {
            return Err(PaperboyError::TopicNotFound(topic.id));
        }
        Ok(())
    }

    /// Advance a topic's ingestion cutoff after a successful run.
    pub fn touch_topic_last_run(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .db
            .execute("UPDATE topics SET last_run_at = ?1 WHERE id = ?2", params![at, id])?;

        if changed == 0 {
            return Err(PaperboyError::TopicNotFound(id));
        }
        Ok(())
    }

    /// Clear a topic's cutoff so its next run rescans from scratch.
    pub fn reset_topic_last_run(&self, id: i64) -> Result<()> {
        let changed = self
            .db
            .execute("UPDATE topics SET last_run_at = NULL WHERE id = ?1", [id])?;

        if changed == 0 {
            return Err(PaperboyError::TopicNotFound(id));
        }
        Ok(())
    }

    /// Get a paper by base id.
    pub fn paper(&self, id: &str) -> Result<Option<Paper>> {
        let result = self
            .db
            .query_row(&format!("{PAPER_SELECT} WHERE id = ?1"), [id], paper_from_row);

        match result {
            Ok(paper) => Ok(Some(paper)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a paper, or overwrite the stored row when the base id exists.
    ///
    /// The caller decides whether an overwrite is warranted; this method
    /// applies it unconditionally.
    pub fn upsert_paper(&self, paper: &Paper) -> Result<()> {
        let authors = serde_json::to_string(&paper.authors)?;
        self.db.execute(
            r#"
            INSERT INTO papers (id, version, title, authors, published_at, updated_at, summary, pdf_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                version = excluded.version,
                title = excluded.title,
                authors = excluded.authors,
                published_at = excluded.published_at,
                updated_at = excluded.updated_at,
                summary = excluded.summary,
                pdf_url = excluded.pdf_url
            "#,
            params![
                paper.id,
                paper.version,
                paper.title,
                authors,
                paper.published_at,
                paper.updated_at,
                paper.summary,
                paper.pdf_url
            ],
        )?;

        Ok(())
    }

    /// Get the link for a (paper, topic) pair.
    pub fn link(&self, paper_id: &str, topic_id: i64) -> Result<Option<PaperTopicLink>> {
        let result = self.db.query_row(
            &format!("{LINK_SELECT} WHERE paper_id = ?1 AND topic_id = ?2"),
            params![paper_id, topic_id],
            link_from_row,
        );

        match result {
            Ok(link) => Ok(Some(link)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace the link for its (paper, topic) pair.
    pub fn save_link(&self, link: &PaperTopicLink) -> Result<()> {
        let tags = serde_json::to_string(&link.tags)?;
        self.db.execute(
            r#"
            INSERT OR REPLACE INTO paper_topic_links
            (paper_id, topic_id, relevance_score, is_relevant, reasoning, digest, tags, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                link.paper_id,
                link.topic_id,
                link.relevance_score,
                link.is_relevant,
                link.reasoning,
                link.digest,
                tags,
                link.created_at
            ],
        )?;

        Ok(())
    }

    /// List relevant links for a topic with their papers, newest first.
    pub fn relevant_links(&self, topic_id: i64) -> Result<Vec<(Paper, PaperTopicLink)>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT p.id, p.version, p.title, p.authors, p.published_at, p.updated_at, p.summary, p.pdf_url,
                   l.paper_id, l.topic_id, l.relevance_score, l.is_relevant, l.reasoning, l.digest, l.tags, l.created_at
            FROM paper_topic_links l
            JOIN papers p ON p.id = l.paper_id
            WHERE l.topic_id = ?1 AND l.is_relevant = 1
            ORDER BY p.published_at DESC
            "#,
        )?;

        let rows = stmt.query_map([topic_id], |row| {
            let paper = Paper {
                id: row.get(0)?,
                version: row.get(1)?,
                title: row.get(2)?,
                authors: decode_list(row, 3)?,
                published_at: row.get(4)?,
                updated_at: row.get(5)?,
                summary: row.get(6)?,
                pdf_url: row.get(7)?,
            };
            let link = PaperTopicLink {
                paper_id: row.get(8)?,
                topic_id: row.get(9)?,
                relevance_score: row.get(10)?,
                is_relevant: row.get(11)?,
                reasoning: row.get(12)?,
                digest: row.get(13)?,
                tags: decode_list(row, 14)?,
                created_at: row.get(15)?,
            };
            Ok((paper, link))
        })?;

        collect(rows)
    }

    /// Count links for one topic.
    pub fn count_links(&self, topic_id: i64) -> Result<usize> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM paper_topic_links WHERE topic_id = ?1",
            [topic_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Count relevant links for one topic.
    pub fn count_relevant(&self, topic_id: i64) -> Result<usize> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM paper_topic_links WHERE topic_id = ?1 AND is_relevant = 1",
            [topic_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Row counts across all tables.
    pub fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            topics: self.count_all("SELECT COUNT(*) FROM topics")?,
            papers: self.count_all("SELECT COUNT(*) FROM papers")?,
            links: self.count_all("SELECT COUNT(*) FROM paper_topic_links")?,
            relevant: self.count_all("SELECT COUNT(*) FROM paper_topic_links WHERE is_relevant = 1")?,
        })
    }

    fn count_all(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.db.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

const TOPIC_SELECT: &str =
    "SELECT id, name, description, query, last_run_at, active, created_at FROM topics";

const PAPER_SELECT: &str =
    "SELECT id, version, title, authors, published_at, updated_at, summary, pdf_url FROM papers";

const LINK_SELECT: &str = "SELECT paper_id, topic_id, relevance_score, is_relevant, reasoning, digest, tags, created_at FROM paper_topic_links";

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        query: row.get(3)?,
        last_run_at: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn paper_from_row(row: &Row<'_>) -> rusqlite::Result<Paper> {
    Ok(Paper {
        id: row.get(0)?,
        version: row.get(1)?,
        title: row.get(2)?,
        authors: decode_list(row, 3)?,
        published_at: row.get(4)?,
        updated_at: row.get(5)?,
        summary: row.get(6)?,
        pdf_url: row.get(7)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<PaperTopicLink> {
    Ok(PaperTopicLink {
        paper_id: row.get(0)?,
        topic_id: row.get(1)?,
        relevance_score: row.get(2)?,
        is_relevant: row.get(3)?,
        reasoning: row.get(4)?,
        digest: row.get(5)?,
        tags: decode_list(row, 6)?,
        created_at: row.get(7)?,
    })
}

/// Decode a JSON-encoded string list column.
fn decode_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
