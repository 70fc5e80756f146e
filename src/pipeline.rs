//! Bounded fan-out over announcements: resolve → extract → match → filter.
//!
//! Every announcement gets its own task; a semaphore caps how many are past
//! the queue at once. Outcomes flow back over one channel and the collector
//! stops only once every task has dropped its sender.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::document::DocumentSource;
use crate::error::ItemError;
use crate::extract::TextExtractor;
use crate::history::HistoryStore;
use crate::matcher::{self, MatchCriteria};
use crate::types::{Announcement, Match, TICKER_MATCH_SENTINEL};

pub const DEFAULT_CONCURRENCY: usize = 10;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_total", "Announcements processed.");
        describe_counter!("pipeline_emitted_total", "Announcements reported as new matches.");
        describe_counter!(
            "pipeline_suppressed_total",
            "Matches already reported earlier today."
        );
        describe_counter!(
            "pipeline_failed_total",
            "Announcements dropped on download or extraction errors."
        );
        describe_histogram!("pipeline_extract_ms", "PDF text extraction time in milliseconds.");
    });
}

/// Where an item was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Extracting,
}

#[derive(Debug)]
pub enum ItemOutcome {
    Emitted(Match),
    /// Matched, but every criterion was already reported today.
    Suppressed,
    Unmatched,
    Failed { stage: Stage, error: ItemError },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub emitted: usize,
    pub suppressed: usize,
    pub unmatched: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// In completion order.
    pub matches: Vec<Match>,
    pub summary: RunSummary,
}

/// Per-run orchestrator. Cheap to clone; every worker holds a clone.
#[derive(Clone)]
pub struct Pipeline {
    documents: Arc<dyn DocumentSource>,
    extractor: Arc<dyn TextExtractor>,
    history: Arc<HistoryStore>,
    criteria: Arc<MatchCriteria>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        documents: Arc<dyn DocumentSource>,
        extractor: Arc<dyn TextExtractor>,
        history: Arc<HistoryStore>,
        criteria: MatchCriteria,
    ) -> Self {
        Self {
            documents,
            extractor,
            history,
            criteria: Arc::new(criteria),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process every announcement. Item failures are logged and dropped;
    /// nothing here fails the run.
    pub async fn run(&self, announcements: Vec<Announcement>) -> RunReport {
        ensure_metrics_described();

        let total = announcements.len();
        info!(
            total,
            keywords = ?self.criteria.keywords(),
            tickers = ?self.criteria.tickers(),
            concurrency = self.concurrency,
            "processing announcements"
        );
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let processed = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel::<ItemOutcome>(self.concurrency);

        for ann in announcements {
            let this = self.clone();
            let permits = Arc::clone(&permits);
            let processed = Arc::clone(&processed);
            let tx = tx.clone();

            tokio::spawn(async move {
                let outcome = {
                    // Never closed, so acquire cannot fail.
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    let n = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(ticker = %ann.ticker, "processing... {n}/{total}");

                    let ticker = ann.ticker.clone();
                    let title = ann.title.clone();
                    let outcome = this.process(ann).await;
                    if let ItemOutcome::Failed { stage, error } = &outcome {
                        warn!(ticker = %ticker, title = %title, stage = ?stage, error = %error, "error processing announcement");
                    }
                    outcome
                };
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut report = RunReport {
            matches: Vec::new(),
            summary: RunSummary {
                total,
                ..RunSummary::default()
            },
        };
        while let Some(outcome) = rx.recv().await {
            counter!("pipeline_items_total").increment(1);
            match outcome {
                ItemOutcome::Emitted(m) => {
                    counter!("pipeline_emitted_total").increment(1);
                    report.summary.emitted += 1;
                    report.matches.push(m);
                }
                ItemOutcome::Suppressed => {
                    counter!("pipeline_suppressed_total").increment(1);
                    report.summary.suppressed += 1;
                }
                ItemOutcome::Unmatched => report.summary.unmatched += 1,
                ItemOutcome::Failed { .. } => {
                    counter!("pipeline_failed_total").increment(1);
                    report.summary.failed += 1;
                }
            }
        }

        info!(
            total,
            emitted = report.summary.emitted,
            suppressed = report.summary.suppressed,
            failed = report.summary.failed,
            "done processing"
        );
        report
    }

    /// One announcement through every stage.
    pub async fn process(&self, mut ann: Announcement) -> ItemOutcome {
        if !self.criteria.may_match(&ann.ticker) {
            return ItemOutcome::Unmatched;
        }

        let document = match self.documents.fetch_document(&mut ann).await {
            Ok(d) => d,
            Err(error) => {
                return ItemOutcome::Failed {
                    stage: Stage::Resolving,
                    error,
                }
            }
        };

        let t0 = Instant::now();
        let text = match self.extractor.extract(&document).await {
            Ok(t) => t,
            Err(e) => {
                return ItemOutcome::Failed {
                    stage: Stage::Extracting,
                    error: e.into(),
                }
            }
        };
        histogram!("pipeline_extract_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let eval = matcher::evaluate(&ann.ticker, &ann.title, &text, &self.criteria);
        if !eval.qualifies() {
            return ItemOutcome::Unmatched;
        }

        let fresh = self
            .history
            .filter_new(&ann.entity_key(), &eval.keywords, eval.ticker_matched);
        if fresh.is_empty() {
            debug!(ticker = %ann.ticker, title = %ann.title, "already reported today");
            return ItemOutcome::Suppressed;
        }

        let keywords: Vec<String> = fresh
            .into_iter()
            .filter(|k| k != TICKER_MATCH_SENTINEL)
            .collect();
        let context = matcher::context_snippet(&ann, &text, &keywords);

        ItemOutcome::Emitted(Match {
            announcement: ann,
            keywords_found: keywords,
            ticker_matched: eval.ticker_matched,
            context,
        })
    }
}
