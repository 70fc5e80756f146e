// src/feed/markit.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::feed::{
    collect_pages, normalize_title, previous_business_day, AnnouncementFeed, FeedPage,
    FetchParams, DEFAULT_PAGE_SIZE,
};
use crate::types::Announcement;

pub const MARKIT_ANNOUNCEMENTS_URL: &str =
    "https://asx.api.markitdigital.com/asx-research/1.0/markets/announcements";
pub const MARKIT_FILE_BASE_URL: &str =
    "https://cdn-api.markitdigital.com/apiman-gateway/ASX/asx-research/1.0/file";

#[derive(Debug, Deserialize)]
struct MarkitResponse {
    data: MarkitData,
}

#[derive(Debug, Deserialize)]
struct MarkitData {
    #[serde(default)]
    items: Vec<MarkitItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkitItem {
    #[serde(default)]
    date: String,
    #[serde(default)]
    document_key: String,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    is_price_sensitive: Option<bool>,
}

/// Paginated JSON feed from Markit Digital's ASX research API.
/// Items link straight to the PDF, so no T&C step is needed.
#[derive(Debug, Clone)]
pub struct MarkitFeed {
    client: Client,
    announcements_url: String,
    file_base_url: String,
    page_size: usize,
    tz: Tz,
}

impl MarkitFeed {
    pub fn new(client: Client, tz: Tz) -> Self {
        Self {
            client,
            announcements_url: MARKIT_ANNOUNCEMENTS_URL.to_string(),
            file_base_url: MARKIT_FILE_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            tz,
        }
    }

    pub fn with_urls(
        mut self,
        announcements_url: impl Into<String>,
        file_base_url: impl Into<String>,
    ) -> Self {
        self.announcements_url = announcements_url.into();
        self.file_base_url = file_base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn page_url(&self, page: u32, params: &FetchParams, date: Option<NaiveDate>) -> String {
        let mut url = format!(
            "{}?page={page}&itemsPerPage={}&priceSensitiveOnly={}",
            self.announcements_url, self.page_size, params.price_sensitive_only
        );
        if let Some(d) = date {
            url.push_str(&format!("&summaryCountsDate={}", d.format("%Y-%m-%d")));
        }
        url
    }

    async fn fetch_page(
        &self,
        page: u32,
        params: &FetchParams,
        target: Option<NaiveDate>,
    ) -> Result<FeedPage, FeedError> {
        let url = self.page_url(page, params, target);
        debug!(url = %url, "fetching announcements page");

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
        let body = resp.text().await.map_err(|source| FeedError::Http {
            url: url.clone(),
            source,
        })?;

        parse_page(&body, &self.file_base_url, self.tz, target, params.price_sensitive_only)
            .map_err(|source| FeedError::Decode { url, source })
    }
}

#[async_trait]
impl AnnouncementFeed for MarkitFeed {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<Announcement>, FeedError> {
        let target = (params.day_offset > 0).then(|| {
            let today = Utc::now().with_timezone(&self.tz).date_naive();
            previous_business_day(today, params.day_offset)
        });

        collect_pages(self.page_size, params.max_results, |page| {
            self.fetch_page(page, params, target)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "Markit"
    }
}

/// Decode one Markit JSON page into announcements.
///
/// Items without a document key or with an unparseable date are skipped.
/// With `target` set, items published on another local date are dropped and
/// an item from before `target` marks the page as past it.
pub fn parse_page(
    body: &str,
    file_base_url: &str,
    tz: Tz,
    target: Option<NaiveDate>,
    price_sensitive_only: bool,
) -> Result<FeedPage, serde_json::Error> {
    let resp: MarkitResponse = serde_json::from_str(body)?;
    let raw_len = resp.data.items.len();

    let mut announcements = Vec::with_capacity(raw_len);
    let mut past_target = false;
    for item in resp.data.items {
        if item.document_key.is_empty() {
            continue;
        }
        let published = match DateTime::parse_from_rfc3339(&item.date) {
            Ok(dt) => dt.with_timezone(&tz),
            Err(e) => {
                warn!(date = %item.date, error = %e, "failed to parse announcement date");
                continue;
            }
        };
        if let Some(t) = target {
            let day = published.date_naive();
            if day < t {
                past_target = true;
            }
            if day != t {
                continue;
            }
        }
        let price_sensitive = item.is_price_sensitive.unwrap_or(price_sensitive_only);
        if price_sensitive_only && !price_sensitive {
            continue;
        }

        announcements.push(Announcement {
            ticker: item.symbol.trim().to_uppercase(),
            published_at: Some(published.fixed_offset()),
            title: normalize_title(&item.headline),
            document_url: format!("{file_base_url}/{}", item.document_key),
            price_sensitive,
        });
    }

    Ok(FeedPage {
        announcements,
        raw_len,
        past_target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://files.test/file";

    fn body() -> &'static str {
        r#"{"data":{"items":[
            {"symbol":"abc","headline":"ABC announces dividend","date":"2025-03-02T23:15:00.000Z","documentKey":"2924-1","isPriceSensitive":true},
            {"symbol":"XYZ","headline":"Appendix 3Y","date":"2025-03-03T01:00:00Z","documentKey":"2924-2","isPriceSensitive":false},
            {"symbol":"NOP","headline":"Missing key","date":"2025-03-03T01:00:00Z","documentKey":""},
            {"symbol":"BAD","headline":"Bad date","date":"yesterday","documentKey":"2924-4"}
        ]}}"#
    }

    #[test]
    fn parses_items_and_skips_incomplete_ones() {
        let page = parse_page(body(), BASE, chrono_tz::Australia::Sydney, None, false).unwrap();
        assert_eq!(page.raw_len, 4);
        assert_eq!(page.announcements.len(), 2);

        let a = &page.announcements[0];
        assert_eq!(a.ticker, "ABC");
        assert_eq!(a.document_url, "https://files.test/file/2924-1");
        assert!(a.price_sensitive);
        // 23:15Z on the 2nd is 10:15 on the 3rd in Sydney (AEDT).
        assert_eq!(
            a.published_at.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        );
    }

    #[test]
    fn price_sensitive_filter_applies_per_item() {
        let page = parse_page(body(), BASE, chrono_tz::Australia::Sydney, None, true).unwrap();
        let tickers: Vec<_> = page.announcements.iter().map(|a| a.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["ABC"]);
    }

    #[test]
    fn target_date_uses_local_zone() {
        let target = NaiveDate::from_ymd_opt(2025, 3, 3);
        let page = parse_page(body(), BASE, chrono_tz::Australia::Sydney, target, false).unwrap();
        assert_eq!(page.announcements.len(), 2);

        assert!(!page.past_target);

        let page = parse_page(body(), BASE, chrono_tz::Tz::UTC, target, false).unwrap();
        assert_eq!(page.announcements.len(), 1);
        assert_eq!(page.announcements[0].ticker, "XYZ");
        // ABC is 2025-03-02 in UTC.
        assert!(page.past_target);
    }

    #[test]
    fn page_url_carries_paging_and_date() {
        let feed = MarkitFeed::new(Client::new(), chrono_tz::Australia::Sydney)
            .with_urls("https://api.test/ann", BASE)
            .with_page_size(50);
        let params = FetchParams {
            price_sensitive_only: true,
            ..FetchParams::default()
        };
        assert_eq!(
            feed.page_url(2, &params, NaiveDate::from_ymd_opt(2025, 3, 3)),
            "https://api.test/ann?page=2&itemsPerPage=50&priceSensitiveOnly=true&summaryCountsDate=2025-03-03"
        );
    }
}
