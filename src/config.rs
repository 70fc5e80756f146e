// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::document::ASX_BASE_URL;
use crate::error::ConfigError;
use crate::feed::markit::{MARKIT_ANNOUNCEMENTS_URL, MARKIT_FILE_BASE_URL};
use crate::history::HistoryStore;

pub const ENV_CONFIG_PATH: &str = "ANNSCRAPER_CONFIG";
pub const ENV_HISTORY_PATH: &str = "ANNSCRAPER_HISTORY_PATH";
pub const ENV_PDFTOTEXT_BIN: &str = "PDFTOTEXT_BIN";
pub const ENV_CONCURRENCY: &str = "ANNSCRAPER_CONCURRENCY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    #[default]
    Markit,
    AsxHtml,
}

fn default_page_size() -> usize {
    100
}
fn default_concurrency() -> usize {
    10
}
fn default_extractor_program() -> String {
    crate::extract::DEFAULT_PROGRAM.to_string()
}
fn default_extractor_timeout_secs() -> u64 {
    120
}
fn default_http_timeout_secs() -> u64 {
    180
}
fn default_timezone() -> String {
    "Australia/Sydney".to_string()
}
fn default_markit_announcements_url() -> String {
    MARKIT_ANNOUNCEMENTS_URL.to_string()
}
fn default_markit_file_base_url() -> String {
    MARKIT_FILE_BASE_URL.to_string()
}
fn default_asx_base_url() -> String {
    ASX_BASE_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default)]
    pub feed: FeedKind,
    #[serde(default = "default_markit_announcements_url")]
    pub markit_announcements_url: String,
    #[serde(default = "default_markit_file_base_url")]
    pub markit_file_base_url: String,
    #[serde(default = "default_asx_base_url")]
    pub asx_base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Announcements processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_extractor_program")]
    pub extractor_program: String,
    #[serde(default = "default_extractor_timeout_secs")]
    pub extractor_timeout_secs: u64,
    /// Per-request ceiling for feed and PDF downloads.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// IANA zone that defines the reporting day.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Defaults to `<tmp>/annscraper/asx_report_history.json`.
    #[serde(default)]
    pub history_path: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            feed: FeedKind::default(),
            markit_announcements_url: default_markit_announcements_url(),
            markit_file_base_url: default_markit_file_base_url(),
            asx_base_url: default_asx_base_url(),
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            extractor_program: default_extractor_program(),
            extractor_timeout_secs: default_extractor_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            timezone: default_timezone(),
            history_path: None,
        }
    }
}

impl ScraperConfig {
    /// Load from an explicit path. Supports TOML or JSON (by extension).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: Self = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON config {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("parsing TOML config {}", path.display()))?,
        };
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $ANNSCRAPER_CONFIG
    /// 2) config/annscraper.toml
    /// 3) config/annscraper.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let toml_p = PathBuf::from("config/annscraper.toml");
                let json_p = PathBuf::from("config/annscraper.json");
                if toml_p.exists() {
                    Self::load_from(&toml_p)?
                } else if json_p.exists() {
                    Self::load_from(&json_p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `--config` wins over the env/fallback chain; env overrides apply either way.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let Some(path) = explicit else {
            return Self::load_default();
        };
        let mut cfg = Self::load_from(path)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(p) = std::env::var(ENV_HISTORY_PATH) {
            if !p.trim().is_empty() {
                self.history_path = Some(PathBuf::from(p));
            }
        }
        if let Ok(bin) = std::env::var(ENV_PDFTOTEXT_BIN) {
            if !bin.trim().is_empty() {
                self.extractor_program = bin;
            }
        }
        if let Ok(n) = std::env::var(ENV_CONCURRENCY) {
            self.concurrency = n
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CONCURRENCY} must be a positive integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be greater than 0".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be greater than 0".into()));
        }
        if self.extractor_timeout_secs == 0 || self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than 0".into()));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimeZone(self.timezone.clone()))
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_secs(self.extractor_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(HistoryStore::default_path)
    }
}
