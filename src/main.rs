//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest web harvester.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sumi_harvest::cache::ResponseCache;
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::output::{
    generate_markdown_summary, print_statistics, write_export, CrawlStatistics, TableFormat,
};
use sumi_harvest::Coordinator;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: A polite, resumable web harvester
///
/// Sumi-Harvest crawls from seed URLs while respecting robots.txt and
/// per-host rate limits, caches responses, and extracts structured records
/// into a CSV or TSV file.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resumable web harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show response cache statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Clear the response cache before crawling
    #[arg(long)]
    fresh: bool,

    /// Write records here instead of the configured export path
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// Write the markdown summary here instead of the configured path
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;

    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Max tasks: {}", crawler.max_tasks);
    println!("  Workers: {}", crawler.worker_count);
    println!(
        "  Delay: {}s floor, {}s ceiling",
        crawler.min_delay_seconds, crawler.max_delay_seconds
    );
    println!("  Fetch timeout: {}s", crawler.fetch_timeout_seconds);
    println!("  Max retries: {}", crawler.max_retries);
    match crawler.crawl_timeout_seconds {
        Some(secs) => println!("  Crawl timeout: {}s", secs),
        None => println!("  Crawl timeout: none"),
    }
    println!("  Respect robots.txt: {}", crawler.respect_robots);

    println!("\nUser Agent: {}", config.user_agent.user_agent_string());

    println!("\nCache:");
    println!(
        "  Database: {}",
        config.cache.database_path.as_deref().unwrap_or("(in memory)")
    );
    println!("  TTL: {}s", config.cache.ttl_seconds);

    println!("\nOutput:");
    println!("  Records: {}", config.output.export_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    if crawler.allowed_domains.is_empty() {
        println!("\nAllowed Domains: seed hosts only");
    } else {
        println!("\nAllowed Domains ({}):", crawler.allowed_domains.len());
        for pattern in &crawler.allowed_domains {
            println!("  - {}", pattern);
        }
    }

    println!("\nFields ({}):", config.extract.fields.len());
    if let Some(item) = &config.extract.item_selector {
        println!("  (one record per {})", item);
    }
    for field in &config.extract.fields {
        println!(
            "  - {} = {} [{:?}, {:?}]",
            field.name, field.selector, field.cardinality, field.value_type
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.seeds.len()
    );
}

/// Handles the --stats mode: shows response cache statistics
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let cache = ResponseCache::from_config(&config.cache).context("Failed to open cache")?;

    println!(
        "Cache: {}\n",
        config.cache.database_path.as_deref().unwrap_or("(in memory)")
    );

    let total = cache.len().context("Failed to count cache entries")?;
    let expired = cache
        .purge_expired()
        .context("Failed to purge expired entries")?;

    println!("=== Cache Statistics ===\n");
    println!("  Entries: {}", total);
    println!("  Expired (purged): {}", expired);
    println!("  Live: {}", total.saturating_sub(expired));
    println!("  TTL: {}s", config.cache.ttl_seconds);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, cli: &Cli) -> anyhow::Result<()> {
    let export_path = cli
        .export
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.export_path));
    let summary_path = cli
        .summary
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.summary_path));

    let coordinator = Coordinator::new(config).context("Failed to set up crawler")?;

    if cli.fresh {
        tracing::info!("Starting fresh crawl (clearing response cache)");
        coordinator
            .cache()
            .clear()
            .context("Failed to clear response cache")?;
    }

    let columns = coordinator.extractor().field_names();

    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            token.cancel();
        }
    });

    let report = coordinator.run().await.context("Crawl failed")?;

    write_export(&export_path, &report.records, &columns)?;
    generate_markdown_summary(&report, Some(config_hash), &summary_path)?;

    println!(
        "✓ {} records exported to: {} ({:?})",
        report.records.len(),
        export_path.display(),
        TableFormat::from_path(&export_path)
    );
    println!("✓ Summary written to: {}\n", summary_path.display());

    print_statistics(&CrawlStatistics::from_report(&report));

    Ok(())
}
