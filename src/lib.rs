// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod feed;
pub mod history;
pub mod matcher;
pub mod notify;
pub mod pipeline;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

pub use crate::config::{FeedKind, ScraperConfig};
pub use crate::feed::{AnnouncementFeed, FetchParams};
pub use crate::history::HistoryStore;
pub use crate::matcher::MatchCriteria;
pub use crate::notify::{LogNotifier, Notifier, NotifierMux};
pub use crate::pipeline::{Pipeline, RunReport, RunSummary};
pub use crate::types::{Announcement, Match};

use crate::document::DocumentResolver;
use crate::extract::PdfToText;
use crate::feed::asx_html::AsxHtmlFeed;
use crate::feed::markit::MarkitFeed;

/// Shared HTTP client. The cookie store carries the T&C session from the
/// consent POST to the PDF download.
pub fn http_client(cfg: &ScraperConfig) -> Result<Client> {
    Client::builder()
        .cookie_store(true)
        .timeout(cfg.http_timeout())
        .user_agent(concat!("annscraper/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")
}

pub fn build_feed(cfg: &ScraperConfig, client: Client) -> Result<Box<dyn AnnouncementFeed>> {
    let tz = cfg.tz()?;
    Ok(match cfg.feed {
        FeedKind::Markit => Box::new(
            MarkitFeed::new(client, tz)
                .with_urls(&cfg.markit_announcements_url, &cfg.markit_file_base_url)
                .with_page_size(cfg.page_size),
        ),
        FeedKind::AsxHtml => Box::new(AsxHtmlFeed::new(client, tz).with_base_url(&cfg.asx_base_url)),
    })
}

/// Wire everything from `cfg` and run once.
pub async fn run(
    cfg: &ScraperConfig,
    criteria: MatchCriteria,
    params: FetchParams,
    notifier: &NotifierMux,
) -> Result<RunReport> {
    let tz = cfg.tz()?;
    let client = http_client(cfg)?;
    let feed = build_feed(cfg, client.clone())?;
    let history = Arc::new(HistoryStore::open(cfg.history_path(), tz));

    let pipeline = Pipeline::new(
        Arc::new(DocumentResolver::new(client).with_base_url(&cfg.asx_base_url)),
        Arc::new(PdfToText::new(&cfg.extractor_program, cfg.extractor_timeout())),
        Arc::clone(&history),
        criteria,
    )
    .with_concurrency(cfg.concurrency);

    run_with(feed.as_ref(), &pipeline, &history, notifier, &params).await
}

/// One run over already-built parts: fetch → pipeline → notify → record.
///
/// A feed failure is the only error returned. History persistence failures
/// are logged; the matches were still delivered.
pub async fn run_with(
    feed: &dyn AnnouncementFeed,
    pipeline: &Pipeline,
    history: &HistoryStore,
    notifier: &NotifierMux,
    params: &FetchParams,
) -> Result<RunReport> {
    info!(feed = feed.name(), ?params, "fetching announcements");
    let announcements = feed
        .fetch(params)
        .await
        .with_context(|| format!("fetching announcements from {}", feed.name()))?;

    if announcements.is_empty() {
        info!("no announcements found");
        persist(history, &[]);
        return Ok(RunReport::default());
    }
    info!(count = announcements.len(), "fetched announcements");

    let report = pipeline.run(announcements).await;

    if report.matches.is_empty() {
        info!("no new matching announcements found");
    } else {
        info!(count = report.matches.len(), "new matching announcements");
        notifier.send_all(&report.matches).await;
    }

    persist(history, &report.matches);
    Ok(report)
}

fn persist(history: &HistoryStore, matches: &[Match]) {
    if let Err(e) = history.record(matches) {
        warn!(path = %history.path().display(), error = %e, "failed to save report history");
    }
}
