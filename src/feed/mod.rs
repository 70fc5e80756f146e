// src/feed/mod.rs
pub mod asx_html;
pub mod markit;

use std::future::Future;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::FeedError;
use crate::types::Announcement;

pub const DEFAULT_PAGE_SIZE: usize = 100;

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_pages_total", "Feed pages fetched and decoded.");
    });
}

/// What to pull from the feed for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchParams {
    /// 0 = today, 1 = previous business day, ...
    pub day_offset: u32,
    pub price_sensitive_only: bool,
    /// `None` = unlimited.
    pub max_results: Option<usize>,
}

#[async_trait]
pub trait AnnouncementFeed: Send + Sync {
    /// All announcements for `params`. Any page failure fails the whole fetch.
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<Announcement>, FeedError>;
    fn name(&self) -> &'static str;
}

/// One decoded feed page.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    /// Records kept after filtering.
    pub announcements: Vec<Announcement>,
    /// Records the upstream returned, before filtering.
    pub raw_len: usize,
    /// The page reached records older than the requested day. The feed is
    /// newest-first, so later pages hold nothing wanted.
    pub past_target: bool,
}

/// Page through `fetch_page(0), fetch_page(1), ...` until a short page, a
/// page that went past the requested day, the result cap (final page
/// trimmed) or the first error.
pub async fn collect_pages<F, Fut>(
    page_size: usize,
    max_results: Option<usize>,
    mut fetch_page: F,
) -> Result<Vec<Announcement>, FeedError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<FeedPage, FeedError>>,
{
    ensure_metrics_described();
    let mut all = Vec::new();
    let mut page = 0u32;
    loop {
        let p = fetch_page(page).await.map_err(|e| FeedError::Page {
            page,
            source: Box::new(e),
        })?;
        counter!("feed_pages_total").increment(1);
        all.extend(p.announcements);

        if let Some(cap) = max_results {
            if all.len() >= cap {
                all.truncate(cap);
                break;
            }
        }
        if p.raw_len < page_size || p.past_target {
            break;
        }
        page += 1;
    }
    Ok(all)
}

/// Step back `offset` business days (Saturday and Sunday skipped).
pub fn previous_business_day(today: NaiveDate, offset: u32) -> NaiveDate {
    let mut day = today;
    let mut left = offset;
    while left > 0 {
        day -= Duration::days(1);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            left -= 1;
        }
    }
    day
}

/// Decode entities, collapse whitespace (incl. NBSP) and trim a headline.
pub fn normalize_title(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{a0}]+").unwrap());
    let decoded = html_escape::decode_html_entities(s);
    re_ws.replace_all(&decoded, " ").trim().to_string()
}
