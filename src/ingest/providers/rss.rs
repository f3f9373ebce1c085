// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::ingest::types::{FeedItem, FeedSource};
use crate::normalize::clean_text;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// RSS dates are RFC 2822 in the wild; a few feeds emit RFC 3339.
/// Anything else is treated as absent and the entry is dropped.
fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let parsed = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?;
    let unix = parsed.to_offset(UtcOffset::UTC).unix_timestamp();
    Utc.timestamp_opt(unix, 0).single()
}

/// One configured RSS 2.0 feed. Fetches over HTTP unless constructed from
/// a fixture (tests).
pub struct RssFeedSource {
    url: String,
    client: reqwest::Client,
    per_feed_cap: usize,
    fixture: Option<String>,
}

impl RssFeedSource {
    pub fn new(url: String, client: reqwest::Client, per_feed_cap: usize) -> Self {
        Self {
            url,
            client,
            per_feed_cap,
            fixture: None,
        }
    }

    /// Parse canned XML instead of fetching; `url` still names the source.
    pub fn from_fixture(url: &str, content: &str, per_feed_cap: usize) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            per_feed_cap,
            fixture: Some(content.to_string()),
        }
    }

    async fn feed_xml(&self) -> Result<String> {
        if let Some(xml) = &self.fixture {
            return Ok(xml.clone());
        }
        let rsp = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("fetching feed {}", self.url))?
            .error_for_status()
            .with_context(|| format!("feed {} returned non-2xx", self.url))?;
        rsp.text()
            .await
            .with_context(|| format!("reading feed body {}", self.url))
    }

    fn parse_items(&self, xml: &str) -> Result<Vec<FeedItem>> {
        let t0 = std::time::Instant::now();

        let rss: Rss =
            from_str(xml).with_context(|| format!("parsing rss xml from {}", self.url))?;

        // Source identifier: the channel's declared title, feed URL otherwise.
        let source = rss
            .channel
            .title
            .as_deref()
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.url.clone());

        let mut out = Vec::new();
        for it in rss.channel.item.into_iter().take(self.per_feed_cap) {
            let title = clean_text(it.title.as_deref().unwrap_or_default());
            let link = it.link.as_deref().unwrap_or_default().trim().to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }
            // Entries without a parsable timestamp are discarded here so the
            // selector downstream never sees a missing `published`.
            let Some(published) = it.pub_date.as_deref().and_then(parse_pub_date) else {
                continue;
            };
            out.push(FeedItem {
                title,
                link,
                source: source.clone(),
                published,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);

        Ok(out)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_latest(&self) -> Result<Vec<FeedItem>> {
        let xml = self.feed_xml().await?;
        self.parse_items(&xml)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2822_and_rfc3339_dates_parse() {
        assert!(parse_pub_date("Tue, 05 Aug 2025 09:30:00 +0530").is_some());
        assert!(parse_pub_date("2025-08-05T09:30:00Z").is_some());
        assert!(parse_pub_date("yesterday-ish").is_none());
    }

    #[test]
    fn rfc2822_offset_converts_to_utc() {
        let dt = parse_pub_date("Tue, 05 Aug 2025 09:30:00 +0530").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-08-05T04:00:00+00:00");
    }
}
