//! history.rs: day-scoped record of what has already been reported.
//!
//! The store maps `ticker|title` to the keyword tokens already alerted on
//! for that announcement. Ticker-only matches are recorded under
//! [`TICKER_MATCH_SENTINEL`]. A file written on a different day than
//! "today" in the reporting zone is ignored on load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::HistoryError;
use crate::types::{Match, TICKER_MATCH_SENTINEL};

pub const HISTORY_DIR_NAME: &str = "annscraper";
pub const HISTORY_FILE_NAME: &str = "asx_report_history.json";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// On-disk shape. Field aliases accept files written by older tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(alias = "ReportDate")]
    pub report_date: String,
    #[serde(alias = "ReportedMatches", default)]
    pub reported_matches: BTreeMap<String, BTreeMap<String, bool>>,
}

impl HistoryRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            report_date: date.format(DATE_FORMAT).to_string(),
            reported_matches: BTreeMap::new(),
        }
    }

    fn is_reported(&self, key: &str, token: &str) -> bool {
        self.reported_matches
            .get(key)
            .and_then(|tokens| tokens.get(token))
            .copied()
            .unwrap_or(false)
    }
}

/// How the store came to hold its current record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file yet.
    Missing,
    /// Today's record was read from disk.
    Loaded { entities: usize },
    /// The file was from another day and was discarded.
    Stale { found: String },
    /// The file could not be read or parsed and was discarded.
    Unreadable { reason: String },
}

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Mutex-guarded owner of the history record. Callers only see
/// [`HistoryStore::filter_new`] and [`HistoryStore::record`].
pub struct HistoryStore {
    inner: Mutex<HistoryRecord>,
    path: PathBuf,
    clock: Clock,
    load_outcome: LoadOutcome,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("path", &self.path)
            .field("load_outcome", &self.load_outcome)
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Open the store at `path`, with "today" taken from the wall clock in `tz`.
    pub fn open(path: impl Into<PathBuf>, tz: Tz) -> Self {
        Self::with_clock(path, move || Utc::now().with_timezone(&tz).date_naive())
    }

    /// Open with an explicit notion of "today" (tests, replays).
    pub fn with_clock<F>(path: impl Into<PathBuf>, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        let path = path.into();
        let today = clock();
        let (record, load_outcome) = load_record(&path, today);

        match &load_outcome {
            LoadOutcome::Missing => info!(
                path = %path.display(),
                "history file not found; starting fresh report"
            ),
            LoadOutcome::Loaded { entities } => info!(
                entities,
                date = %record.report_date,
                "loaded reported matches for today"
            ),
            LoadOutcome::Stale { found } => info!(
                found = %found,
                today = %record.report_date,
                "history is from another day; starting new report history"
            ),
            LoadOutcome::Unreadable { reason } => warn!(
                path = %path.display(),
                reason = %reason,
                "history file unusable; starting fresh report"
            ),
        }

        Self {
            inner: Mutex::new(record),
            path,
            clock: Box::new(clock),
            load_outcome,
        }
    }

    /// Default location under the system temp dir, shared by every run.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir()
            .join(HISTORY_DIR_NAME)
            .join(HISTORY_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    /// Candidates not yet reported for `entity_key`. A ticker match with no
    /// keywords is checked as the sentinel token. Pure read.
    pub fn filter_new(
        &self,
        entity_key: &str,
        candidates: &[String],
        ticker_matched: bool,
    ) -> Vec<String> {
        let sentinel;
        let candidates: &[String] = if ticker_matched && candidates.is_empty() {
            sentinel = [TICKER_MATCH_SENTINEL.to_string()];
            &sentinel
        } else {
            candidates
        };

        let record = self.lock();
        candidates
            .iter()
            .filter(|token| !record.is_reported(entity_key, token))
            .cloned()
            .collect()
    }

    /// Mark every match as reported and write the whole store to disk.
    /// Call once per run, also with no matches so the day rollover is saved.
    pub fn record(&self, matches: &[Match]) -> Result<(), HistoryError> {
        let mut record = self.lock();
        for m in matches {
            let tokens = record.reported_matches.entry(m.entity_key()).or_default();
            if m.is_ticker_only() {
                tokens.insert(TICKER_MATCH_SENTINEL.to_string(), true);
            }
            for kw in &m.keywords_found {
                tokens.insert(kw.clone(), true);
            }
        }
        record.report_date = (self.clock)().format(DATE_FORMAT).to_string();

        save_record(&self.path, &record)?;
        info!(
            path = %self.path.display(),
            entities = record.reported_matches.len(),
            "saved report history"
        );
        Ok(())
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> HistoryRecord {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryRecord> {
        // A panic while holding the lock leaves the map consistent (every
        // mutation is a single insert), so keep using it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn load_record(path: &Path, today: NaiveDate) -> (HistoryRecord, LoadOutcome) {
    let fresh = HistoryRecord::empty(today);
    match read_record(path) {
        Ok(None) => (fresh, LoadOutcome::Missing),
        Ok(Some(loaded)) if loaded.report_date == fresh.report_date => {
            let entities = loaded.reported_matches.len();
            (loaded, LoadOutcome::Loaded { entities })
        }
        Ok(Some(loaded)) => (
            fresh,
            LoadOutcome::Stale {
                found: loaded.report_date,
            },
        ),
        Err(e) => (
            fresh,
            LoadOutcome::Unreadable {
                reason: e.to_string(),
            },
        ),
    }
}

fn read_record(path: &Path) -> Result<Option<HistoryRecord>, HistoryError> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(HistoryError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| HistoryError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn save_record(path: &Path, record: &HistoryRecord) -> Result<(), HistoryError> {
    let persist_err = |reason: String| HistoryError::Persist {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| persist_err(e.to_string()))?;
    }
    let data = serde_json::to_vec_pretty(record).map_err(|e| persist_err(e.to_string()))?;

    // Write beside the target and rename so a crash never leaves half a file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data).map_err(|e| persist_err(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| persist_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Announcement;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn matched(ticker: &str, title: &str, kws: &[&str], ticker_matched: bool) -> Match {
        Match {
            announcement: Announcement {
                ticker: ticker.into(),
                published_at: None,
                title: title.into(),
                document_url: String::new(),
                price_sensitive: true,
            },
            keywords_found: kws.iter().map(|s| s.to_string()).collect(),
            ticker_matched,
            context: String::new(),
        }
    }

    #[test]
    fn unknown_entity_passes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::with_clock(dir.path().join("h.json"), || day(3));
        assert_eq!(store.load_outcome(), &LoadOutcome::Missing);

        let cands = vec!["gold".to_string(), "copper".to_string()];
        assert_eq!(store.filter_new("ABC|Title", &cands, false), cands);
        assert!(store.filter_new("ABC|Title", &[], false).is_empty());
    }

    #[test]
    fn record_then_filter_suppresses_and_filter_is_pure() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::with_clock(dir.path().join("h.json"), || day(3));
        let key = "ABC|ABC announces dividend";
        let cands = vec!["dividend".to_string()];

        assert_eq!(store.filter_new(key, &cands, false), cands);
        assert_eq!(store.filter_new(key, &cands, false), cands);

        store
            .record(&[matched("ABC", "ABC announces dividend", &["dividend"], false)])
            .unwrap();
        assert!(store.filter_new(key, &cands, false).is_empty());
        assert!(store.filter_new(key, &cands, false).is_empty());

        let more = vec!["dividend".to_string(), "buyback".to_string()];
        assert_eq!(store.filter_new(key, &more, false), vec!["buyback".to_string()]);
    }

    #[test]
    fn ticker_only_uses_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::with_clock(dir.path().join("h.json"), || day(3));
        let key = "XYZ|Quarterly activities report";

        assert_eq!(
            store.filter_new(key, &[], true),
            vec![TICKER_MATCH_SENTINEL.to_string()]
        );
        store
            .record(&[matched("XYZ", "Quarterly activities report", &[], true)])
            .unwrap();
        assert!(store.filter_new(key, &[], true).is_empty());

        let rec = store.snapshot();
        assert!(rec.reported_matches[key][TICKER_MATCH_SENTINEL]);
    }

    #[test]
    fn stale_file_is_discarded_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");

        let yesterday = HistoryStore::with_clock(&path, || day(3));
        yesterday
            .record(&[matched("ABC", "T", &["gold"], false)])
            .unwrap();

        let today = HistoryStore::with_clock(&path, || day(4));
        assert_eq!(
            today.load_outcome(),
            &LoadOutcome::Stale {
                found: "2025-03-03".into()
            }
        );
        assert_eq!(
            today.filter_new("ABC|T", &["gold".to_string()], false),
            vec!["gold".to_string()]
        );
        assert_eq!(today.snapshot().report_date, "2025-03-04");
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        fs::write(&path, "{ not json").unwrap();

        let store = HistoryStore::with_clock(&path, || day(3));
        assert!(matches!(
            store.load_outcome(),
            LoadOutcome::Unreadable { .. }
        ));
        assert!(store.snapshot().reported_matches.is_empty());
    }

    #[test]
    fn empty_record_persists_rollover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("h.json");
        let store = HistoryStore::with_clock(&path, || day(5));
        store.record(&[]).unwrap();

        let on_disk: HistoryRecord = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.report_date, "2025-03-05");
        assert!(on_disk.reported_matches.is_empty());
    }

    #[test]
    fn accepts_legacy_field_names() {
        let legacy = r#"{"ReportDate":"2025-03-03","ReportedMatches":{"ABC|T":{"gold":true}}}"#;
        let rec: HistoryRecord = serde_json::from_str(legacy).unwrap();
        assert!(rec.is_reported("ABC|T", "gold"));
        assert!(!rec.is_reported("ABC|T", "copper"));
    }
}
