//! Summarizer: provider abstraction + file cache + daily request budget.
//!
//! The handle is constructed once in the binary and passed down the
//! pipeline; when the provider is disabled, unconfigured, over budget or
//! failing, callers degrade to a plain truncation of the input.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Trait object used by the pipeline and tests.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Compress `text` into roughly `max_words` words. `None` means the
    /// provider could not answer; the caller falls back to truncation.
    async fn summarize(&self, text: &str, max_words: usize) -> Option<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynSummarizer = Arc<dyn Summarizer>;

/// Summarizer section of the pipeline config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub enabled: bool,
    /// "openai" is the only real provider for now.
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Real API calls per day; cache hits are free. Defaults to 20.
    pub daily_limit: Option<u32>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: None,
            model: None,
            daily_limit: Some(20),
            cache_dir: None,
        }
    }
}

/// Factory: build a handle according to config and environment.
///
/// * `SUMMARIZER_TEST_MODE=mock` returns a deterministic mock.
/// * `enabled == false` returns a disabled handle.
/// * Otherwise the real provider wrapped with caching + daily budget.
pub fn build_summarizer(config: &SummarizerConfig) -> DynSummarizer {
    if std::env::var("SUMMARIZER_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockSummarizer {
            fixed: "A fixed mock synopsis of the trend.".to_string(),
        });
    }

    if !config.enabled {
        return Arc::new(DisabledSummarizer);
    }

    match config.provider.as_deref() {
        Some("openai") => {
            let provider = OpenAiSummarizer::new(config.model.as_deref());
            let cache_dir = config
                .cache_dir
                .clone()
                .unwrap_or_else(default_cache_dir);
            Arc::new(CachingSummarizer::new(
                provider,
                cache_dir,
                config.daily_limit.unwrap_or(20),
            ))
        }
        _ => Arc::new(DisabledSummarizer),
    }
}

/// Fallback cap, matching the original behavior of handing the reader the
/// first ~1200 chars of merged text when no model is available.
const FALLBACK_MAX_CHARS: usize = 1200;

/// Summarize with graceful degradation: provider first, word-boundary
/// truncation of the input when it declines.
pub async fn summarize_or_truncate(
    summarizer: &dyn Summarizer,
    text: &str,
    max_words: usize,
) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    match summarizer.summarize(text, max_words).await {
        Some(s) => s,
        None => {
            tracing::warn!(
                provider = summarizer.provider_name(),
                "summarizer unavailable; falling back to truncation"
            );
            truncate_fallback(text, FALLBACK_MAX_CHARS)
        }
    }
}

/// Cut at a word boundary within `max_chars` characters.
pub fn truncate_fallback(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(' ') {
        Some(i) => cut[..i].trim_end().to_string(),
        None => cut,
    }
}

/// Single line, collapsed whitespace. Providers occasionally wrap output
/// in newlines or pad it; the rendered page wants one paragraph.
fn sanitize_summary(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_space = false;
    for ch in input.chars() {
        let c = if ch.is_whitespace() { ' ' } else { ch };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

// ------------------------------------------------------------
// Providers
// ------------------------------------------------------------

/// OpenAI Chat Completions provider. Requires `OPENAI_API_KEY`.
pub struct OpenAiSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(model_override: Option<&str>) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("trendwire/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let model = model_override.unwrap_or("gpt-4o-mini").to_string();
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str, max_words: usize) -> Option<String> {
        if self.api_key.is_empty() {
            return None;
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let sys = format!(
            "You are a news editor. Condense the supplied article text into a \
             factual synopsis of about {max_words} words. Plain prose, no \
             headlines, no bullet points, no emojis."
        );
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &sys,
                },
                Msg {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.2,
            max_tokens: ((max_words * 2).clamp(120, 400)) as u32,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .ok()?;

        if !resp.status().is_success() {
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        let cleaned = sanitize_summary(content);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Returns `None` always; the truncation fallback handles the rest.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _text: &str, _max_words: usize) -> Option<String> {
        None
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic provider for tests/local runs.
pub struct MockSummarizer {
    pub fixed: String,
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, _text: &str, _max_words: usize) -> Option<String> {
        Some(self.fixed.clone())
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching wrapper (file cache + daily budget)
// ------------------------------------------------------------

/// Counter state is guarded by a `Mutex`; a poisoned lock counts as an
/// exhausted budget rather than a panic.
pub struct CachingSummarizer<S: Summarizer> {
    inner: S,
    cache_dir: PathBuf,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<S: Summarizer> CachingSummarizer<S> {
    pub fn new(inner: S, cache_dir: PathBuf, daily_limit: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir);
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit,
            counter,
        }
    }
}

#[async_trait]
impl<S: Summarizer> Summarizer for CachingSummarizer<S> {
    async fn summarize(&self, text: &str, max_words: usize) -> Option<String> {
        // 1) Cache lookup; hits do not touch the budget.
        let key = cache_key(text, max_words);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Some(hit.text);
        }

        // 2) Daily budget check.
        {
            let mut g = self.counter.lock().ok()?;
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_daily_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit {
                tracing::warn!(limit = self.daily_limit, "summarizer daily budget spent");
                return None;
            }
        }

        // 3) Real call; increment only after success.
        let fresh = sanitize_summary(&self.inner.summarize(text, max_words).await?);
        if fresh.is_empty() {
            return None;
        }
        let _ = write_cache_file(&self.cache_dir, &key, &SummaryRecord { text: fresh.clone() });
        if let Ok(mut g) = self.counter.lock() {
            g.count = g.count.saturating_add(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
        Some(fresh)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SummaryRecord {
    text: String,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/summaries")
}

fn cache_key(input: &str, max_words: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.update(max_words.to_le_bytes());
    let digest = hasher.finalize();
    // 16 hex chars of the digest are plenty for a filename.
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<SummaryRecord> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &SummaryRecord) -> Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).context("serializing summary record")?;
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

// ------------------------------------------------------------
// Daily budget helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> Option<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir)).ok()?;
    serde_json::from_str(&s).ok()
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).context("serializing daily counter")?;
    fs::write(&tmp, s).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, &p).with_context(|| format!("renaming into {}", p.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_cuts_at_word_boundary() {
        let text = "alpha bravo charlie delta";
        assert_eq!(truncate_fallback(text, 13), "alpha bravo");
        assert_eq!(truncate_fallback(text, 100), text);
    }

    #[test]
    fn sanitize_collapses_to_single_line() {
        assert_eq!(
            sanitize_summary("  One.\n\nTwo.\t Three.  "),
            "One. Two. Three."
        );
    }

    #[test]
    fn cache_key_varies_with_input_and_length() {
        let a = cache_key("same text", 120);
        let b = cache_key("same text", 60);
        let c = cache_key("other text", 120);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn caching_wrapper_serves_hits_without_spending_budget() {
        let dir = tempfile::tempdir().unwrap();
        let client = CachingSummarizer::new(
            MockSummarizer {
                fixed: "Canned synopsis.".to_string(),
            },
            dir.path().to_path_buf(),
            1,
        );
        // First call spends the single budget slot and caches.
        assert_eq!(
            client.summarize("story text", 120).await.as_deref(),
            Some("Canned synopsis.")
        );
        // Second call is a cache hit despite the spent budget.
        assert_eq!(
            client.summarize("story text", 120).await.as_deref(),
            Some("Canned synopsis.")
        );
        // A different input now has no budget left.
        assert_eq!(client.summarize("new text", 120).await, None);
    }
}
