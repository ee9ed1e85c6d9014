//! Sumi-Glean main entry point
//!
//! This is the command-line interface for the Sumi-Glean scraper.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use sumi_glean::config::{
    load_config_with_hash, validate_output_filename, validate_selectors, Config,
};
use sumi_glean::{Record, Scraper, SelectorMap, TracingSink};
use tracing_subscriber::EnvFilter;

/// Sumi-Glean: a polite structured-data scraper
///
/// Sumi-Glean fetches pages while respecting robots.txt and rate limits,
/// extracts fields with CSS selectors, follows pagination links and saves
/// the results as CSV, JSON or SQLite.
#[derive(Parser, Debug)]
#[command(name = "sumi-glean")]
#[command(version)]
#[command(about = "A polite structured-data scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Scrape a target defined in the configuration
    #[arg(short, long, value_name = "NAME", conflicts_with_all = ["url", "urls_file"])]
    target: Option<String>,

    /// Scrape a single URL with the given selectors
    #[arg(long, requires = "selectors", conflicts_with = "urls_file")]
    url: Option<String>,

    /// Scrape every URL listed in a file (one per line, `#` starts a comment)
    #[arg(long, value_name = "FILE", requires = "selectors")]
    urls_file: Option<PathBuf>,

    /// Selector map as a JSON object, e.g. '{"title": "h1"}'
    #[arg(long, value_name = "JSON")]
    selectors: Option<String>,

    /// Fetch the URLs of --urls-file concurrently
    #[arg(long, requires = "urls_file")]
    concurrent: bool,

    /// Output file name, overriding the configured one
    #[arg(short, long, value_name = "NAME")]
    output: Option<String>,

    /// List the configured targets and exit
    #[arg(long)]
    list_targets: bool,

    /// Validate config and show what would be scraped without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// What a run should scrape
enum Mode {
    Target(String),
    Url(String, SelectorMap),
    UrlList {
        urls: Vec<String>,
        selectors: SelectorMap,
        concurrent: bool,
    },
    ListTargets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let mode = resolve_mode(&cli)?;
    if let Some(output) = &cli.output {
        validate_output_filename(output).context("Invalid --output")?;
    }

    if cli.dry_run {
        handle_dry_run(&config, &mode);
        return Ok(());
    }

    if let Mode::ListTargets = mode {
        print_targets(&config);
        return Ok(());
    }

    let scraper = Scraper::new(config, Arc::new(TracingSink))?;

    // Ctrl-C stops every mode from admitting new pages or URLs; in-flight fetches finish
    let stop = scraper.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let records = run_mode(&scraper, mode).await?;
    println!("Scraped {} records", records.len());

    match scraper
        .save(&records, cli.output.as_deref())
        .context("Failed to save records")?
    {
        Some(path) => println!("Saved to {}", path.display()),
        None => println!("No data to save"),
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_glean=info,warn"),
            1 => EnvFilter::new("sumi_glean=debug,info"),
            2 => EnvFilter::new("sumi_glean=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn resolve_mode(cli: &Cli) -> Result<Mode> {
    if cli.list_targets {
        return Ok(Mode::ListTargets);
    }

    if let Some(name) = &cli.target {
        return Ok(Mode::Target(name.clone()));
    }

    if let Some(url) = &cli.url {
        let selectors = parse_selectors(cli.selectors.as_deref())?;
        return Ok(Mode::Url(url.clone(), selectors));
    }

    if let Some(file) = &cli.urls_file {
        let selectors = parse_selectors(cli.selectors.as_deref())?;
        let urls = read_urls_file(file)?;
        return Ok(Mode::UrlList {
            urls,
            selectors,
            concurrent: cli.concurrent,
        });
    }

    Ok(Mode::ListTargets)
}

/// Parses and validates a selector map given as a JSON object
fn parse_selectors(json: Option<&str>) -> Result<SelectorMap> {
    let json = json.context("--selectors is required with --url and --urls-file")?;
    let selectors: SelectorMap =
        serde_json::from_str(json).context("--selectors must be a JSON object of strings")?;
    validate_selectors(&selectors)?;
    Ok(selectors)
}

fn read_urls_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

async fn run_mode(scraper: &Scraper, mode: Mode) -> Result<Vec<Record>> {
    let records = match mode {
        Mode::Target(name) => scraper.scrape_target(&name).await?,
        Mode::Url(url, selectors) => scraper
            .scrape_url(&url, &selectors)
            .await
            .into_iter()
            .collect(),
        Mode::UrlList {
            urls,
            selectors,
            concurrent,
        } => {
            if concurrent {
                scraper.scrape_urls_concurrent(&urls, &selectors).await
            } else {
                scraper.scrape_urls(&urls, &selectors).await
            }
        }
        Mode::ListTargets => Vec::new(),
    };
    Ok(records)
}

fn print_targets(config: &Config) {
    if config.targets.is_empty() {
        println!("No targets configured");
        return;
    }

    println!("Available targets:");
    for (name, target) in &config.targets {
        println!("  {} - {}", name, target.base_url);
    }
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config, mode: &Mode) {
    println!("=== Sumi-Glean Dry Run ===\n");

    let scraper = &config.scraper;
    println!("Scraper Configuration:");
    println!("  Timeout: {}s", scraper.timeout_secs);
    println!("  Rate limit: {}ms", scraper.rate_limit_ms);
    println!("  Max attempts: {}", scraper.max_retries);
    println!("  Concurrency limit: {}", scraper.concurrency_limit);
    println!("  User agent: {}", scraper.effective_user_agent());
    println!("  Respect robots.txt: {}", scraper.respect_robots);
    println!(
        "  Backoff: multiplier {}ms, min {}ms, max {}ms",
        scraper.backoff.multiplier_ms, scraper.backoff.min_ms, scraper.backoff.max_ms
    );

    println!("\nOutput:");
    println!("  Format: {}", config.output.format);
    println!("  Directory: {}", config.output.directory.display());
    println!("  Filename: {}", config.output.filename);
    println!("  Timestamp suffix: {}", config.output.include_timestamp);

    println!("\nTargets ({}):", config.targets.len());
    for (name, target) in &config.targets {
        let pagination = if target.pagination.enabled {
            format!("up to {} pages", target.pagination.max_pages)
        } else {
            "single page".to_string()
        };
        println!(
            "  - {} ({} fields, {}): {}",
            name,
            target.selectors.len(),
            pagination,
            target.base_url
        );
    }

    println!("\n✓ Configuration is valid");
    match mode {
        Mode::Target(name) if config.targets.contains_key(name) => {
            println!("✓ Would scrape target {}", name)
        }
        Mode::Target(name) => println!("✗ Unknown target {}", name),
        Mode::Url(url, selectors) => {
            println!("✓ Would scrape {} with {} selectors", url, selectors.len())
        }
        Mode::UrlList {
            urls, concurrent, ..
        } => println!(
            "✓ Would scrape {} URLs {}",
            urls.len(),
            if *concurrent {
                "concurrently"
            } else {
                "sequentially"
            }
        ),
        Mode::ListTargets => println!("✓ No scrape requested"),
    }
}
