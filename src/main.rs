//! pricewatch - concurrent price monitor for Amazon and eBay listings.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pricewatch::commands::{CheckCommand, HistoryCommand, ProbeCommand, WatchCommand};
use pricewatch::config::{Config, OutputFormat};
use pricewatch::format::Formatter;
use pricewatch::platform::Platform;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricewatch",
    version,
    about = "Concurrent price monitor for Amazon and eBay listings",
    long_about = "Fetches tracked listings concurrently with browser TLS emulation, retries rate limits with backoff, and keeps an append-only price history."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "PRICEWATCH_PROXY")]
    proxy: Option<String>,

    /// Products fetched concurrently
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one price check over the catalog
    #[command(alias = "c")]
    Check {
        /// Only check these product ids
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },

    /// Run checks repeatedly until interrupted
    #[command(alias = "w")]
    Watch {
        /// Seconds between cycles
        #[arg(short, long, default_value = "3600")]
        interval: u64,
    },

    /// Show recorded prices for a product
    #[command(alias = "h")]
    History {
        /// Product id
        id: String,

        /// Number of observations to show
        #[arg(short, long, default_value = "30")]
        limit: usize,
    },

    /// Fetch and parse one URL without recording it
    Probe {
        /// Platform (amazon, ebay)
        platform: Platform,

        /// Listing URL
        url: String,
    },

    /// List supported platforms and storefronts
    Platforms,
}

/// Cancels the token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight requests");
            trigger.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }

    let formatter = Formatter::new(config.format);

    match cli.command {
        Commands::Check { only } => {
            let cancel = cancel_on_ctrl_c();
            let report = CheckCommand::new(config).execute(&only, &cancel).await?;
            println!("{}", formatter.format_report(&report));

            if report.is_degraded() {
                anyhow::bail!(
                    "{} observations could not be stored",
                    report.summary.storage_failures
                );
            }
        }

        Commands::Watch { interval } => {
            let cancel = cancel_on_ctrl_c();
            let cmd = WatchCommand::new(config, Duration::from_secs(interval.max(1)));
            cmd.execute(&cancel, |report| println!("{}\n", formatter.format_report(report)))
                .await?;
        }

        Commands::History { id, limit } => {
            let output = HistoryCommand::new(config).execute(&id, limit).await?;
            println!("{}", output);
        }

        Commands::Probe { platform, url } => {
            let cancel = cancel_on_ctrl_c();
            let report = ProbeCommand::new(config).execute(platform, &url, &cancel).await?;
            println!("{}", formatter.format_report(&report));

            if !report.results.iter().all(|r| r.outcome.is_success()) {
                anyhow::bail!("No price could be extracted from {}", url);
            }
        }

        Commands::Platforms => {
            println!("{}", formatter.format_platforms());
        }
    }

    Ok(())
}
