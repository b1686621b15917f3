use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use paperboy::arxiv::{ArxivClient, ArxivConfig};
use paperboy::cli::{Cli, Commands, ReportFormat};
use paperboy::config::Config;
use paperboy::core::{
    IngestStatus, PaperDisposition, TopicReport, UpdateOptions, UpdateRunner, regenerate_digests,
    translate_topic, validate_query,
};
use paperboy::llm::create_client;
use paperboy::report::DigestRenderer;
use paperboy::store::PaperStore;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paperboy")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("paperboy.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn open_store(config: &Config) -> Result<PaperStore> {
    PaperStore::open(&config.app.db_path).context("Failed to open paper database")
}

fn build_feed(config: &Config) -> Result<ArxivClient> {
    ArxivClient::new(ArxivConfig {
        base_url: config.arxiv.base_url.clone(),
        page_size: config.arxiv.page_size,
        request_delay: Duration::from_secs_f64(config.arxiv.request_delay_secs),
        timeout: Duration::from_secs(config.arxiv.timeout_secs),
        ..ArxivConfig::default()
    })
    .context("Failed to build arXiv client")
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

async fn run_application(cli: Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    let verbose = cli.is_verbose();
    if verbose {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        None => {
            Cli::command()
                .print_help()
                .context("Failed to print help")?;
            Ok(())
        }
        Some(Commands::AddTopic { name, description }) => {
            handle_add_topic(&name, &description, config).await
        }
        Some(Commands::ListTopics { show_queries }) => handle_list_topics(show_queries, config),
        Some(Commands::Update {
            quiet,
            since,
            force,
            max_requests_per_minute,
        }) => {
            handle_update(
                quiet,
                since.as_deref(),
                force,
                max_requests_per_minute,
                verbose,
                config,
            )
            .await
        }
        Some(Commands::Status {
            reset_topic,
            rate_limit,
        }) => handle_status(reset_topic, rate_limit, config),
        Some(Commands::Digest {
            topic_id,
            force,
            export,
            format,
            max_requests_per_minute,
        }) => {
            handle_digest(
                topic_id,
                force,
                export.as_deref(),
                format,
                max_requests_per_minute,
                config,
            )
            .await
        }
        Some(Commands::EditTopic {
            id,
            name,
            description,
            query,
            activate,
            deactivate,
        }) => {
            handle_edit_topic(
                id,
                name.as_deref(),
                description.as_deref(),
                query.as_deref(),
                activate,
                deactivate,
                config,
            )
            .await
        }
    }
}

async fn handle_add_topic(name: &str, description: &str, config: &Config) -> Result<()> {
    info!("Adding topic '{}'", name);
    println!("{} {}", "Adding topic:".blue().bold(), name);
    println!("{} {}", "Description:".dimmed(), description);

    let llm = create_client(config)?;
    let feed = build_feed(config)?;
    let store = open_store(config)?;

    let query = match translate_topic(llm.as_ref(), &feed, description).await {
        Ok(query) => {
            println!("{} Generated query: {}", "✓".green(), query.cyan());
            query
        }
        Err(err) => {
            println!("{} Failed to generate query: {}", "✗".red(), err);
            return Err(err.into());
        }
    };

    let topic = store
        .add_topic(name, description, &query)
        .context("Failed to add topic")?;
    println!("{} Topic '{}' added successfully!", "✓".green(), topic.name);
    Ok(())
}

fn handle_list_topics(show_queries: bool, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let topics = store.topics()?;

    if topics.is_empty() {
        println!("{}", "No topics found.".yellow());
        return Ok(());
    }

    if show_queries {
        // Detailed view with queries
        for (i, topic) in topics.iter().enumerate() {
            let last_run = topic
                .last_run_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "Never".to_string());
            let status = if topic.active {
                "✓ Active".green()
            } else {
                "✗ Inactive".red()
            };

            println!(
                "\n{} {}",
                format!("{}. {}", i + 1, topic.name).cyan().bold(),
                format!("(ID: {})", topic.id).dimmed()
            );
            println!("   Status: {status}");
            println!("   Last Run: {last_run}");
            println!("   Description: {}", topic.description);
            println!("   Query: {}", topic.query.green());
            println!("{}", "-".repeat(60));
        }
    } else {
        // Compact table view
        println!(
            "{:<4} {:<24} {:<50} {:^6} {:<12}",
            "ID", "Name", "Description", "Active", "Last Run"
        );
        println!("{}", "-".repeat(100));
        for topic in &topics {
            let last_run = topic
                .last_run_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "Never".to_string());
            println!(
                "{:<4} {:<24} {:<50} {:^6} {:<12}",
                topic.id,
                ellipsize(&topic.name, 22),
                ellipsize(&topic.description, 48),
                if topic.active { "✓" } else { "✗" },
                last_run
            );
        }
        println!(
            "\n{}",
            "Use --show-queries to see exact arXiv query strings".dimmed()
        );
    }
    Ok(())
}

async fn handle_update(
    quiet: bool,
    since: Option<&str>,
    force: bool,
    max_requests_per_minute: Option<f64>,
    verbose: bool,
    config: &Config,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(rpm) = max_requests_per_minute {
        config.rate_limit.max_requests_per_minute = rpm;
    }

    let store = open_store(&config)?;
    let feed = build_feed(&config)?;
    let llm = create_client(&config)?;

    let runner = UpdateRunner::new(
        &store,
        &feed,
        llm.as_ref(),
        Duration::from_secs_f64(config.app.throttling_delay_secs),
    );

    let options = UpdateOptions {
        since: since.map(str::to_string),
        force,
    };
    let reports = runner.run(&options).await?;

    if reports.is_empty() {
        if !quiet {
            println!("{}", "No active topics found.".yellow());
        }
        return Ok(());
    }

    if !quiet {
        for report in &reports {
            print_topic_report(report, verbose);
        }
        println!("\n{}", "Update complete!".green().bold());
    }
    Ok(())
}

fn print_topic_report(report: &TopicReport, verbose: bool) {
    println!("\n{} {}", "Topic:".blue().bold(), report.topic_name);
    match &report.status {
        IngestStatus::ZeroResults => {
            println!(
                "{}",
                format!(
                    "Warning: 0 results found for '{}'. Check your query: {}",
                    report.topic_name, report.topic_query
                )
                .yellow()
            );
            return;
        }
        IngestStatus::Error(message) => {
            println!(
                "{}",
                format!(
                    "Error fetching papers for '{}': {}",
                    report.topic_name, message
                )
                .red()
            );
            return;
        }
        IngestStatus::Success => {}
    }

    if report.papers.is_empty() {
        println!("{}", "No new papers found.".dimmed());
        return;
    }
    println!("{}", format!("Found {} new papers", report.fetched()).green());

    for paper in &report.papers {
        match &paper.disposition {
            PaperDisposition::Relevant { .. } => {
                println!(
                    "{} Relevant paper: {}",
                    "✓".green(),
                    ellipsize(&paper.title, 60)
                );
            }
            PaperDisposition::NotRelevant { .. } => {
                if verbose {
                    println!(
                        "{} Skipped paper: {}",
                        "✗".dimmed(),
                        ellipsize(&paper.title, 60)
                    );
                }
            }
            PaperDisposition::Skipped => {
                if verbose {
                    println!(
                        "{} Already processed: {}",
                        "→".dimmed(),
                        ellipsize(&paper.title, 60)
                    );
                }
            }
            PaperDisposition::Failed(message) => {
                println!(
                    "{}",
                    format!("Error processing paper '{}': {}", paper.title, message).red()
                );
            }
        }
    }

    if report.processed() > 0 {
        println!(
            "{}",
            format!(
                "Processed {} papers for topic '{}'",
                report.processed(),
                report.topic_name
            )
            .green()
        );
    }
}

fn handle_status(reset_topic: Option<i64>, rate_limit: bool, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let counts = store.counts()?;
    let active = store.active_topics()?.len();

    println!("\n{}", "Database Status".blue().bold());
    println!("{}", "=".repeat(40));
    println!("Topics: {}/{} active", active, counts.topics);
    println!("Total Papers: {}", counts.papers);
    println!("Paper-Topic Links: {}", counts.links);
    println!("Relevant Papers: {}", counts.relevant);

    let topics = store.topics()?;
    if !topics.is_empty() {
        println!("\n{}", "Topics Details".blue().bold());
        println!("{}", "=".repeat(40));

        for topic in &topics {
            let last_run = topic
                .last_run_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "Never".to_string());
            let relevant = store.count_relevant(topic.id)?;
            let total = store.count_links(topic.id)?;
            let icon = if topic.active {
                "✓".green()
            } else {
                "✗".red()
            };

            println!("{} Topic {}: {}", icon, topic.id, topic.name);
            println!("    Last run: {last_run}");
            println!("    Papers: {relevant}/{total} relevant");
            println!("    Query: {}", ellipsize(&topic.query, 80));
            println!();
        }
    }

    if rate_limit {
        print_rate_limit_status(config);
    }

    if let Some(id) = reset_topic {
        match store.topic(id)? {
            Some(topic) => {
                store.reset_topic_last_run(id)?;
                println!(
                    "{}",
                    format!("✓ Reset topic '{}' (ID: {})", topic.name, topic.id).green()
                );
            }
            None => println!("{}", format!("Topic with ID {id} not found").red()),
        }
    }
    Ok(())
}

fn print_rate_limit_status(config: &Config) {
    println!("\n{}", "Rate Limiting Status".blue().bold());
    println!("{}", "=".repeat(40));

    if !config.rate_limit.enabled {
        println!("Rate limiting: {}", "Disabled".red());
        return;
    }

    println!("Rate limiting: {}", "Enabled".green());
    println!(
        "Max requests per minute: {}",
        config.rate_limit.max_requests_per_minute
    );

    // A fresh client has no traffic yet; the window snapshot still shows
    // the configured budget.
    match create_client(config) {
        Ok(llm) => {
            if let Some(stats) = llm.stats() {
                println!(
                    "Requests in last minute: {}",
                    stats.window.requests_in_window
                );
                println!("Remaining requests: {:.0}", stats.window.requests_remaining);
                println!("Total requests made: {}", stats.total_requests);
                println!("Rate limit errors: {}", stats.rate_limit_errors);
                let rate = format!("{:.1}%", stats.error_rate * 100.0);
                if stats.error_rate > 0.0 {
                    println!("Error rate: {}", rate.yellow());
                } else {
                    println!("Error rate: {}", rate.green());
                }
            }
        }
        Err(err) => {
            println!(
                "{}",
                format!("Could not fetch rate limit stats: {err}").dimmed()
            );
        }
    }
}

async fn handle_digest(
    topic_id: Option<i64>,
    force: bool,
    export: Option<&Path>,
    format: ReportFormat,
    max_requests_per_minute: Option<f64>,
    config: &Config,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(rpm) = max_requests_per_minute {
        config.rate_limit.max_requests_per_minute = rpm;
    }

    let store = open_store(&config)?;
    let topics = match topic_id {
        Some(id) => match store.topic(id)? {
            Some(topic) => vec![topic],
            None => bail!("Topic with ID {id} not found"),
        },
        None => store.active_topics()?,
    };

    if export.is_some() && topics.len() > 1 {
        bail!("--export needs a topic ID when more than one topic is active");
    }

    let llm = if force {
        Some(create_client(&config)?)
    } else {
        None
    };
    let renderer = DigestRenderer::new();

    for topic in &topics {
        println!("\n{} {}", "Digest for:".blue().bold(), topic.name);
        println!("{}", topic.description.dimmed());
        println!("{}", "=".repeat(50));

        if let Some(llm) = &llm {
            let pending = store.count_relevant(topic.id)?;
            if pending > 0 {
                println!("{}", format!("Regenerating {pending} digests...").yellow());
                let count = regenerate_digests(&store, llm.as_ref(), topic).await?;
                println!("{}", format!("✓ Regenerated {count} digests").green());
            }
        }

        let entries = store.relevant_links(topic.id)?;
        if entries.is_empty() {
            println!("{}", "No relevant papers found.".yellow());
            continue;
        }

        for (i, (paper, link)) in entries.iter().enumerate() {
            println!(
                "\n{}",
                format!("{}. {}", i + 1, paper.title).green().bold()
            );
            println!(
                "{}",
                format!("Authors: {}", paper.authors.join(", ")).dimmed()
            );
            println!(
                "{}",
                format!("Published: {}", paper.published_at.format("%Y-%m-%d")).dimmed()
            );
            println!(
                "{}",
                format!("Relevance Score: {:.1}/10", link.relevance_score).dimmed()
            );
            println!("\n{}", link.digest.as_deref().unwrap_or(""));
            println!("{}", "-".repeat(30));
        }

        if let Some(path) = export {
            let content = match format {
                ReportFormat::Markdown => renderer.markdown(topic, &entries)?,
                ReportFormat::Html => renderer.html(topic, &entries)?,
            };
            fs::write(path, content)
                .with_context(|| format!("Failed to write digest to {}", path.display()))?;
            println!(
                "{}",
                format!("✓ Exported digest to {}", path.display()).green()
            );
        }
    }
    Ok(())
}

async fn handle_edit_topic(
    id: i64,
    name: Option<&str>,
    description: Option<&str>,
    query: Option<&str>,
    activate: bool,
    deactivate: bool,
    config: &Config,
) -> Result<()> {
    let store = open_store(config)?;
    let Some(topic) = store.topic(id)? else {
        bail!("Topic with ID {id} not found");
    };

    println!("{} {}", "Editing topic:".blue().bold(), topic.name);
    println!("{} {}", "Current query:".dimmed(), topic.query);

    if let Some(new_query) = query {
        let feed = build_feed(config)?;
        match validate_query(&feed, new_query).await {
            Ok(()) => println!("{} Query validated successfully", "✓".green()),
            Err(err) => {
                println!("{} Query validation failed: {}", "✗".red(), err);
                return Err(err.into());
            }
        }
    }

    let mut updated = topic.clone();
    let mut changed = false;

    if let Some(new_name) = name {
        println!(
            "{} Name changed: {} → {}",
            "✓".green(),
            topic.name,
            new_name
        );
        updated.name = new_name.to_string();
        changed = true;
    }
    if let Some(new_description) = description {
        println!("{} Description changed", "✓".green());
        updated.description = new_description.to_string();
        changed = true;
    }
    if let Some(new_query) = query {
        println!("{} Query changed", "✓".green());
        updated.query = new_query.to_string();
        changed = true;
    }
    if activate && !topic.active {
        updated.active = true;
        changed = true;
        println!("{} Topic activated", "✓".green());
    }
    if deactivate && topic.active {
        updated.active = false;
        changed = true;
        println!("{} Topic deactivated", "✓".yellow());
    }

    if !changed {
        println!("{}", "No changes made.".yellow());
        return Ok(());
    }

    store.update_topic(&updated)?;
    println!(
        "{}",
        format!("Topic '{}' updated successfully!", updated.name)
            .green()
            .bold()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first so -v can raise the log level
    let cli = Cli::parse();

    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(cli, &config).await.context("Application failed")?;

    Ok(())
}
