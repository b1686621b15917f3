//! CLI module for paperboy - command-line interface and subcommands.
//!
//! Provides the entry point with subcommands for topic management,
//! update runs, status inspection, and digest reports.

pub mod commands;

pub use commands::{Cli, Commands, ReportFormat};
