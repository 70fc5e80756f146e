use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::Notifier;
use crate::types::Match;

/// Writes each match as one structured `info` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, matches: &[Match]) -> Result<()> {
        for m in matches {
            let a = &m.announcement;
            info!(
                ticker = %a.ticker,
                title = %a.title,
                published = ?a.published_at.map(|t| t.to_rfc3339()),
                price_sensitive = a.price_sensitive,
                keywords = %m.keywords_found.join(","),
                ticker_matched = m.ticker_matched,
                url = %a.document_url,
                context = %m.context,
                "new match"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
