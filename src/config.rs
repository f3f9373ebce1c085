// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::summarize::SummarizerConfig;

const ENV_PATH: &str = "TRENDWIRE_CONFIG_PATH";
const ENV_BASE_URL: &str = "TRENDWIRE_BASE_URL";

/// Everything one run needs. Any field missing from the file falls back
/// to the built-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// RSS feed URLs to poll.
    pub feeds: Vec<String>,
    /// Trailing recency window for headlines.
    pub window_minutes: i64,
    /// Entries read per feed.
    pub per_feed_cap: usize,
    /// Distinct outlets required before a cluster counts as a trend.
    pub min_sources: usize,
    /// Articles fetched and merged for the chosen trend.
    pub max_merge: usize,
    /// Approximate word budget for the synopsis.
    pub summary_words: usize,
    /// Headline length cap for the rendered page.
    pub title_max: usize,
    pub docs_dir: PathBuf,
    pub images_dir: PathBuf,
    /// Public base URL of the published pages (link in the announcement).
    pub base_url: String,
    pub user_agent: String,
    /// Base hashtags prepended to the announcement.
    pub hashtags: Vec<String>,
    pub summarizer: SummarizerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            window_minutes: 90,
            per_feed_cap: 6,
            min_sources: 2,
            max_merge: 3,
            summary_words: 120,
            title_max: 110,
            docs_dir: PathBuf::from("docs"),
            images_dir: PathBuf::from("docs/images"),
            base_url: "https://example.invalid/trendwire".to_string(),
            user_agent: "Mozilla/5.0 (compatible; Trendwire/0.1)".to_string(),
            hashtags: vec!["#Trendwire".to_string()],
            summarizer: SummarizerConfig::default(),
        }
    }
}

/// Load from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load using env var + fallbacks:
/// 1) $TRENDWIRE_CONFIG_PATH
/// 2) config/trendwire.toml
/// 3) config/trendwire.json
/// 4) built-in defaults
/// `TRENDWIRE_BASE_URL` overrides the configured base URL either way.
pub fn load_config_default() -> Result<PipelineConfig> {
    let mut cfg = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("TRENDWIRE_CONFIG_PATH points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/trendwire.toml");
        let json_p = PathBuf::from("config/trendwire.json");
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            PipelineConfig::default()
        }
    };

    if let Ok(url) = std::env::var(ENV_BASE_URL) {
        cfg.base_url = url;
    }
    Ok(cfg)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("feeds");
    if try_toml {
        if let Ok(v) = toml::from_str::<PipelineConfig>(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str::<PipelineConfig>(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = toml::from_str::<PipelineConfig>(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported config format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let toml = r#"
            feeds = ["https://example.test/rss"]
            min_sources = 3
        "#;
        let cfg = parse_config(toml, "toml").unwrap();
        assert_eq!(cfg.feeds, vec!["https://example.test/rss".to_string()]);
        assert_eq!(cfg.min_sources, 3);
        // untouched fields keep their defaults
        assert_eq!(cfg.window_minutes, 90);
        assert_eq!(cfg.max_merge, 3);
    }

    #[test]
    fn json_is_accepted_too() {
        let json = r#"{ "feeds": ["https://example.test/rss"], "per_feed_cap": 4 }"#;
        let cfg = parse_config(json, "json").unwrap();
        assert_eq!(cfg.per_feed_cap, 4);
    }

    #[serial_test::serial]
    #[test]
    fn env_path_wins_and_base_url_override_applies() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("pipeline.toml");
        fs::write(&p, "min_sources = 4\n").unwrap();

        env::set_var(ENV_PATH, p.display().to_string());
        env::set_var(ENV_BASE_URL, "https://pages.example.test/buzz");
        let cfg = load_config_default().unwrap();
        env::remove_var(ENV_PATH);
        env::remove_var(ENV_BASE_URL);

        assert_eq!(cfg.min_sources, 4);
        assert_eq!(cfg.base_url, "https://pages.example.test/buzz");
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_path_is_an_error() {
        env::set_var(ENV_PATH, "/definitely/not/here.toml");
        let res = load_config_default();
        env::remove_var(ENV_PATH);
        assert!(res.is_err());
    }
}
