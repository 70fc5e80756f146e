// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ann_scraper::error::{ExtractError, FeedError, ItemError};
use ann_scraper::extract::TextExtractor;
use ann_scraper::document::DocumentSource;
use ann_scraper::{Announcement, AnnouncementFeed, FetchParams, HistoryStore};
use async_trait::async_trait;
use chrono::NaiveDate;

pub fn ann(ticker: &str, title: &str) -> Announcement {
    Announcement {
        ticker: ticker.to_string(),
        published_at: None,
        title: title.to_string(),
        document_url: format!("https://files.test/{}.pdf", ticker.to_lowercase()),
        price_sensitive: true,
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

pub fn store_on(path: &std::path::Path, d: u32) -> HistoryStore {
    HistoryStore::with_clock(path, move || day(d))
}

/// Feed returning a fixed list.
pub struct FixedFeed(pub Vec<Announcement>);

#[async_trait]
impl AnnouncementFeed for FixedFeed {
    async fn fetch(&self, _params: &FetchParams) -> Result<Vec<Announcement>, FeedError> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "Fixed"
    }
}

pub struct DownFeed;

#[async_trait]
impl AnnouncementFeed for DownFeed {
    async fn fetch(&self, _params: &FetchParams) -> Result<Vec<Announcement>, FeedError> {
        Err(FeedError::Status {
            url: "https://feed.test/ann".into(),
            status: 503,
        })
    }
    fn name(&self) -> &'static str {
        "Down"
    }
}

/// "Document" bytes are the body text keyed by ticker. Unknown tickers 404.
#[derive(Default)]
pub struct Bodies {
    pub by_ticker: HashMap<String, String>,
    pub downloads: AtomicUsize,
}

impl Bodies {
    pub fn with(mut self, ticker: &str, body: &str) -> Self {
        self.by_ticker.insert(ticker.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl DocumentSource for Bodies {
    async fn fetch_document(&self, ann: &mut Announcement) -> Result<Vec<u8>, ItemError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        match self.by_ticker.get(&ann.ticker) {
            Some(b) => Ok(b.as_bytes().to_vec()),
            None => Err(ItemError::Status {
                url: ann.document_url.clone(),
                status: 404,
            }),
        }
    }
}

/// Treats the document bytes as text; `FAIL` makes extraction fail.
pub struct PlainText;

#[async_trait]
impl TextExtractor for PlainText {
    async fn extract(&self, document: &[u8]) -> Result<String, ExtractError> {
        let text = String::from_utf8_lossy(document).into_owned();
        if text == "FAIL" {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

pub fn shared<T>(v: T) -> Arc<T> {
    Arc::new(v)
}
