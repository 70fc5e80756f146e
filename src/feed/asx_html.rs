// src/feed/asx_html.rs
//! Single-page HTML feed from asx.com.au (today / previous business day).
//!
//! Each `<tbody><tr>` is one announcement: ticker, `DD/MM/YYYY H:MM AM/PM`,
//! a price-sensitive marker cell and a link whose text (up to the first
//! `<br>`) is the headline. Links are T&C trigger URLs.

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use metrics::counter;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use crate::document::ASX_BASE_URL;
use crate::error::FeedError;
use crate::feed::{ensure_metrics_described, normalize_title, AnnouncementFeed, FetchParams};
use crate::types::Announcement;

pub const TODAY_PATH: &str = "/asx/v2/statistics/todayAnns.do";
pub const PREVIOUS_PATH: &str = "/asx/v2/statistics/prevBusDayAnns.do";
const DATE_FORMAT: &str = "%d/%m/%Y %I:%M %p";

#[derive(Debug, Clone)]
pub struct AsxHtmlFeed {
    client: Client,
    base_url: String,
    tz: Tz,
}

impl AsxHtmlFeed {
    pub fn new(client: Client, tz: Tz) -> Self {
        Self {
            client,
            base_url: ASX_BASE_URL.to_string(),
            tz,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AnnouncementFeed for AsxHtmlFeed {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<Announcement>, FeedError> {
        let path = match params.day_offset {
            0 => TODAY_PATH,
            1 => PREVIOUS_PATH,
            n => {
                warn!(day_offset = n, "HTML feed only serves the previous business day");
                PREVIOUS_PATH
            }
        };
        ensure_metrics_described();
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "fetching announcements table");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FeedError::Http {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let html = resp.text().await.map_err(|source| FeedError::Http {
            url: url.clone(),
            source,
        })?;
        counter!("feed_pages_total").increment(1);

        let mut out: Vec<Announcement> = parse_table(&html, &self.base_url, self.tz)?
            .into_iter()
            .filter(|a| !params.price_sensitive_only || a.price_sensitive)
            .collect();
        if let Some(cap) = params.max_results {
            out.truncate(cap);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "ASX"
    }
}

fn selector(s: &str) -> Result<Selector, FeedError> {
    Selector::parse(s).map_err(|e| FeedError::Parse(format!("selector '{s}': {e}")))
}

/// Parse every announcement row. Rows without a document link are skipped.
pub fn parse_table(html: &str, base_url: &str, tz: Tz) -> Result<Vec<Announcement>, FeedError> {
    let doc = Html::parse_document(html);
    let rows = selector("tbody tr")?;
    let links = selector("a[href]")?;

    let mut out = Vec::new();
    for row in doc.select(&rows) {
        let cells: Vec<ElementRef> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == "td")
            .collect();
        if cells.len() < 4 {
            continue;
        }
        let Some(link) = cells[3].select(&links).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() {
            continue;
        }
        let document_url = if href.starts_with('/') {
            format!("{base_url}{href}")
        } else {
            href.to_string()
        };

        out.push(Announcement {
            ticker: cell_text(cells[0]).to_uppercase(),
            published_at: parse_timestamp(&cell_text(cells[1]), tz),
            title: link_title(link),
            document_url,
            price_sensitive: is_price_sensitive(cells[2]),
        });
    }
    Ok(out)
}

fn cell_text(cell: ElementRef) -> String {
    normalize_title(&cell.text().collect::<Vec<_>>().join(" "))
}

/// Headline text before the first `<br>` (the rest is page count / size).
fn link_title(link: ElementRef) -> String {
    let mut parts = Vec::new();
    for child in link.children() {
        match child.value() {
            Node::Text(t) => parts.push(t.trim().to_string()),
            Node::Element(e) if e.name() == "br" => break,
            _ => {}
        }
    }
    normalize_title(&parts.join(" "))
}

fn is_price_sensitive(cell: ElementRef) -> bool {
    let marked = |e: ElementRef| e.value().classes().any(|c| c.contains("pricesens"));
    marked(cell) || cell.descendants().filter_map(ElementRef::wrap).any(marked)
}

fn parse_timestamp(text: &str, tz: Tz) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    let cleaned = text.to_uppercase();
    match NaiveDateTime::parse_from_str(&cleaned, DATE_FORMAT) {
        Ok(naive) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.fixed_offset()),
        Err(e) => {
            warn!(date = %text, error = %e, "failed to parse announcement timestamp");
            None
        }
    }
}
