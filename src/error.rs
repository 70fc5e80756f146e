//! Error taxonomy for the scraper.
//!
//! Feed errors abort a run. Item errors are contained by the pipeline and
//! logged against the announcement. History errors never stop a run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fetching or decoding the announcement feed failed. Always fatal.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feed returned status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode feed page from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse feed: {0}")]
    Parse(String),
    #[error("failed to fetch announcements page {page}: {source}")]
    Page {
        page: u32,
        #[source]
        source: Box<FeedError>,
    },
}

/// Which way the extractor tool failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The extractor binary could not be found.
    NotInstalled,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotInstalled => f.write_str("not installed"),
            FailureKind::Other => f.write_str("tool error"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("text extraction failed ({kind}): {detail}")]
    Failed { kind: FailureKind, detail: String },
    #[error("text extraction timed out after {0:?}")]
    TimedOut(Duration),
    #[error("extractor produced empty text; file may be image-based or protected")]
    Empty,
}

impl ExtractError {
    pub(crate) fn other(detail: impl Into<String>) -> Self {
        ExtractError::Failed {
            kind: FailureKind::Other,
            detail: detail.into(),
        }
    }
}

/// Per-announcement failure. Logged and the item dropped.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("no document found at {url}")]
    DocumentNotFound { url: String },
    #[error("T&C form detected at {url}, but it has no pdfURL field")]
    ConsentFormMissingUrl { url: String },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("document download returned status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("PDF text extraction failed: {0}")]
    Extraction(#[from] ExtractError),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("failed to read history file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to persist history to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
}
