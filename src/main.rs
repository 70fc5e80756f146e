//! annscraper: scan today's ASX announcements for keywords and tickers.
//!
//! Thin bootstrap: parse flags, load config, init tracing, run once.

use std::path::PathBuf;

use anyhow::Result;
use ann_scraper::{FetchParams, LogNotifier, MatchCriteria, NotifierMux, ScraperConfig};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "annscraper", version, about = "Report new ASX announcements matching keywords or tickers")]
struct Cli {
    /// Comma-separated keywords (case-insensitive)
    #[arg(short, long, default_value = "")]
    keywords: String,

    /// Comma-separated ASX tickers
    #[arg(short, long, default_value = "")]
    tickers: String,

    /// Only price-sensitive announcements
    #[arg(short = 's', long)]
    price_sensitive: bool,

    /// Use the previous business day instead of today
    #[arg(short, long)]
    previous: bool,

    /// Stop after this many announcements
    #[arg(long)]
    max_results: Option<usize>,

    /// Config file (TOML or JSON); overrides $ANNSCRAPER_CONFIG
    #[arg(long, env = "ANNSCRAPER_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("ANNSCRAPER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let criteria = match MatchCriteria::parse(&cli.keywords, &cli.tickers) {
        Ok(c) => c,
        Err(e) => {
            use clap::CommandFactory;
            Cli::command()
                .error(clap::error::ErrorKind::MissingRequiredArgument, e.to_string())
                .exit();
        }
    };

    init_tracing();

    let cfg = ScraperConfig::load(cli.config.as_deref())?;
    let params = FetchParams {
        day_offset: u32::from(cli.previous),
        price_sensitive_only: cli.price_sensitive,
        max_results: cli.max_results,
    };
    let notifier = NotifierMux::new().with(LogNotifier);

    let report = ann_scraper::run(&cfg, criteria, params, &notifier).await?;
    tracing::info!(
        total = report.summary.total,
        emitted = report.summary.emitted,
        suppressed = report.summary.suppressed,
        failed = report.summary.failed,
        "run complete"
    );
    Ok(())
}
