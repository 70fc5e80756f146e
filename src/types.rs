// src/types.rs
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// History token recorded when an announcement matched on ticker alone.
pub const TICKER_MATCH_SENTINEL: &str = "__TICKER_MATCHED__";

/// Separator between ticker and title in an entity key.
pub const ENTITY_KEY_SEPARATOR: char = '|';

/// One disclosure item from the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub ticker: String,
    /// Publication time in the market's local zone. `None` when the feed
    /// row carried a timestamp we could not parse.
    pub published_at: Option<DateTime<FixedOffset>>,
    pub title: String,
    /// Trigger URL or direct document URL; the resolver may rewrite it.
    pub document_url: String,
    pub price_sensitive: bool,
}

impl Announcement {
    /// Stable dedup identity: `ticker|title`.
    pub fn entity_key(&self) -> String {
        entity_key(&self.ticker, &self.title)
    }
}

pub fn entity_key(ticker: &str, title: &str) -> String {
    format!("{ticker}{ENTITY_KEY_SEPARATOR}{title}")
}

/// An announcement that satisfied the criteria and survived history filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub announcement: Announcement,
    /// New keywords, title hits first. Empty for a ticker-only match.
    pub keywords_found: Vec<String>,
    pub ticker_matched: bool,
    pub context: String,
}

impl Match {
    pub fn entity_key(&self) -> String {
        self.announcement.entity_key()
    }

    pub fn is_ticker_only(&self) -> bool {
        self.ticker_matched && self.keywords_found.is_empty()
    }
}
