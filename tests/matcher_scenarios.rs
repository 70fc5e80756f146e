// tests/matcher_scenarios.rs
mod common;

use std::sync::Arc;

use ann_scraper::history::HistoryStore;
use ann_scraper::types::TICKER_MATCH_SENTINEL;
use ann_scraper::{run_with, FetchParams, MatchCriteria, NotifierMux, Pipeline};
use common::{ann, store_on, Bodies, FixedFeed, PlainText};

fn pipeline(bodies: Bodies, history: Arc<HistoryStore>, criteria: MatchCriteria) -> Pipeline {
    Pipeline::new(Arc::new(bodies), Arc::new(PlainText), history, criteria).with_concurrency(4)
}

#[tokio::test]
async fn title_keyword_reported_once_per_day() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let feed = FixedFeed(vec![ann("ABC", "ABC announces dividend")]);
    let bodies = || Bodies::default().with("ABC", "... special dividend payable ...");

    // First run reports the title hit.
    let history = Arc::new(store_on(&path, 3));
    let p = pipeline(bodies(), Arc::clone(&history), MatchCriteria::parse("dividend", "").unwrap());
    let report = run_with(&feed, &p, &history, &NotifierMux::new(), &FetchParams::default())
        .await
        .unwrap();

    assert_eq!(report.matches.len(), 1);
    let m = &report.matches[0];
    assert_eq!(m.keywords_found, vec!["dividend".to_string()]);
    assert_eq!(m.context, "ABC announces dividend (Match found in title)");

    // Second run, same day, fresh process: suppressed.
    let history = Arc::new(store_on(&path, 3));
    let p = pipeline(bodies(), Arc::clone(&history), MatchCriteria::parse("dividend", "").unwrap());
    let report = run_with(&feed, &p, &history, &NotifierMux::new(), &FetchParams::default())
        .await
        .unwrap();
    assert!(report.matches.is_empty());
    assert_eq!(report.summary.suppressed, 1);
}

#[tokio::test]
async fn new_keyword_on_known_entity_is_still_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let feed = FixedFeed(vec![ann("ABC", "Quarterly activities report")]);
    let body = "Drilling at the lithium project confirmed a maiden resource.";

    let history = Arc::new(store_on(&path, 3));
    let p = pipeline(
        Bodies::default().with("ABC", body),
        Arc::clone(&history),
        MatchCriteria::parse("lithium", "").unwrap(),
    );
    run_with(&feed, &p, &history, &NotifierMux::new(), &FetchParams::default())
        .await
        .unwrap();

    let history = Arc::new(store_on(&path, 3));
    let p = pipeline(
        Bodies::default().with("ABC", body),
        Arc::clone(&history),
        MatchCriteria::parse("lithium, resource", "").unwrap(),
    );
    let report = run_with(&feed, &p, &history, &NotifierMux::new(), &FetchParams::default())
        .await
        .unwrap();

    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].keywords_found, vec!["resource".to_string()]);
    assert!(report.matches[0].context.contains("maiden resource"));
}

#[tokio::test]
async fn ticker_only_match_uses_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let feed = FixedFeed(vec![ann("XYZ", "Appendix 3Y"), ann("QQQ", "Appendix 3Y")]);
    let bodies = || {
        Bodies::default()
            .with("XYZ", "Change of director's interest notice")
            .with("QQQ", "Change of director's interest notice")
    };

    let history = Arc::new(store_on(&path, 3));
    let p = pipeline(bodies(), Arc::clone(&history), MatchCriteria::parse("", "xyz").unwrap());
    let report = run_with(&feed, &p, &history, &NotifierMux::new(), &FetchParams::default())
        .await
        .unwrap();

    assert_eq!(report.matches.len(), 1);
    let m = &report.matches[0];
    assert_eq!(m.announcement.ticker, "XYZ");
    assert!(m.ticker_matched);
    assert!(m.keywords_found.is_empty());
    assert!(m.context.contains("XYZ"));

    let saved = history.snapshot();
    assert_eq!(
        saved.reported_matches["XYZ|Appendix 3Y"].get(TICKER_MATCH_SENTINEL),
        Some(&true)
    );
    // Non-candidates are never downloaded.
    assert!(!saved.reported_matches.contains_key("QQQ|Appendix 3Y"));

    let history = Arc::new(store_on(&path, 3));
    let p = pipeline(bodies(), Arc::clone(&history), MatchCriteria::parse("", "XYZ").unwrap());
    let report = run_with(&feed, &p, &history, &NotifierMux::new(), &FetchParams::default())
        .await
        .unwrap();
    assert!(report.matches.is_empty());
}
