//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - add-topic / edit-topic / list-topics: topic management
//! - update: fetch and triage new papers
//! - status: database and rate limiter overview
//! - digest: print or export digest reports

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Paperboy - arXiv paper triage with LLM relevance filtering
#[derive(Parser, Debug)]
#[command(name = "paperboy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a new research topic
    AddTopic {
        /// Name of the research topic
        name: String,

        /// Natural language description of the research topic
        description: String,
    },

    /// List all research topics
    ListTopics {
        /// Show exact arXiv query strings
        #[arg(short = 'q', long)]
        show_queries: bool,
    },

    /// Fetch and triage new papers for every active topic
    Update {
        /// Run without output for cron jobs
        #[arg(short, long)]
        quiet: bool,

        /// Fetch papers since this date (dd-mm-yyyy)
        #[arg(long, value_name = "DATE")]
        since: Option<String>,

        /// Rescore papers that were already processed
        #[arg(short, long)]
        force: bool,

        /// Override rate limit: max LLM requests per minute
        #[arg(long, value_name = "N")]
        max_requests_per_minute: Option<f64>,
    },

    /// Show database status and optionally reset topics
    Status {
        /// Clear a topic's last run so the next update rescans it
        #[arg(long, value_name = "ID")]
        reset_topic: Option<i64>,

        /// Show rate limiting statistics
        #[arg(short = 'r', long)]
        rate_limit: bool,
    },

    /// Print or export the digest for one or all topics
    Digest {
        /// Topic ID (all active topics when omitted)
        topic_id: Option<i64>,

        /// Regenerate digests for all relevant papers first
        #[arg(short, long)]
        force: bool,

        /// Write the digest to this file as well as printing it
        #[arg(short, long, value_name = "PATH")]
        export: Option<PathBuf>,

        /// Export format
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,

        /// Override rate limit: max LLM requests per minute
        #[arg(long, value_name = "N")]
        max_requests_per_minute: Option<f64>,
    },

    /// Edit an existing topic's properties
    EditTopic {
        /// Topic ID to edit
        id: i64,

        /// New topic name
        #[arg(long)]
        name: Option<String>,

        /// New topic description
        #[arg(long)]
        description: Option<String>,

        /// New arXiv query string (validated against the feed first)
        #[arg(long)]
        query: Option<String>,

        /// Activate the topic
        #[arg(long)]
        activate: bool,

        /// Deactivate the topic
        #[arg(long, conflicts_with = "activate")]
        deactivate: bool,
    },
}

/// Digest export formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Html,
}
