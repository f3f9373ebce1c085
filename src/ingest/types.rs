// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One observed headline occurrence, validated at ingestion. `published`
/// is non-optional by type: entries without a parsable timestamp never
/// become a `FeedItem`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,            // cleaned, non-empty
    pub link: String,             // canonical article URL, non-empty
    pub source: String,           // feed display name, or feed URL if unnamed
    pub published: DateTime<Utc>, // timezone-aware
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<FeedItem>>;
    fn name(&self) -> &str;
}
