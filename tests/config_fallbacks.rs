// tests/config_fallbacks.rs
use std::{env, fs};

use ann_scraper::config::{ENV_CONCURRENCY, ENV_CONFIG_PATH, ENV_HISTORY_PATH, ENV_PDFTOTEXT_BIN};
use ann_scraper::{FeedKind, ScraperConfig};

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate cwd so the repo's own config/ isn't read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    for var in [ENV_CONFIG_PATH, ENV_CONCURRENCY, ENV_HISTORY_PATH, ENV_PDFTOTEXT_BIN] {
        env::remove_var(var);
    }

    // 1) nothing → defaults
    let cfg = ScraperConfig::load_default().unwrap();
    assert_eq!(cfg, ScraperConfig::default());

    // 2) config/annscraper.json fallback
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("annscraper.json"), r#"{"page_size": 25}"#).unwrap();
    assert_eq!(ScraperConfig::load_default().unwrap().page_size, 25);

    // 3) TOML beats JSON in config/
    fs::write(cfg_dir.join("annscraper.toml"), "feed = \"asx_html\"\npage_size = 50\n").unwrap();
    let cfg = ScraperConfig::load_default().unwrap();
    assert_eq!(cfg.feed, FeedKind::AsxHtml);
    assert_eq!(cfg.page_size, 50);

    // 4) env path wins, env overrides apply last
    let p_env = tmp.path().join("elsewhere.toml");
    fs::write(&p_env, "concurrency = 2\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, &p_env);
    env::set_var(ENV_CONCURRENCY, "6");
    let cfg = ScraperConfig::load_default().unwrap();
    assert_eq!(cfg.feed, FeedKind::Markit);
    assert_eq!(cfg.concurrency, 6);

    // 5) dangling env path is an error
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    assert!(ScraperConfig::load_default().is_err());

    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_CONCURRENCY);
    env::set_current_dir(old).unwrap();
}

#[serial_test::serial]
#[test]
fn explicit_path_is_validated() {
    env::remove_var(ENV_CONCURRENCY);
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("bad.toml");
    fs::write(&p, "timezone = \"Nowhere/Land\"\n").unwrap();
    let err = ScraperConfig::load(Some(&p)).unwrap_err();
    assert!(format!("{err:#}").contains("Nowhere/Land"));
}
