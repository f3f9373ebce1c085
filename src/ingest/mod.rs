// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{FeedItem, FeedSource};
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in any installed recorder).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total entries parsed from feeds.");
        describe_counter!(
            "ingest_kept_total",
            "Entries kept after the recency-window filter."
        );
        describe_counter!(
            "ingest_window_dropped_total",
            "Entries dropped for falling outside the recency window."
        );
        describe_counter!("ingest_source_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when feed ingestion last ran."
        );
    });
}

/// Keep items published at or after `cutoff`, newest first.
pub fn filter_recent(cutoff: DateTime<Utc>, items: Vec<FeedItem>) -> (Vec<FeedItem>, usize) {
    let before = items.len();
    let mut recent: Vec<FeedItem> = items
        .into_iter()
        .filter(|i| i.published >= cutoff)
        .collect();
    recent.sort_by(|a, b| b.published.cmp(&a.published));
    let dropped = before - recent.len();
    (recent, dropped)
}

/// Poll every source once, sequentially. A failing source is logged and
/// skipped; it never aborts the run. Returns the recency-filtered,
/// newest-first item list the selector consumes.
pub async fn run_once(sources: &[Box<dyn FeedSource>], window_minutes: i64) -> Vec<FeedItem> {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for s in sources {
        match s.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                tracing::warn!(error = ?e, source = s.name(), "feed source error");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }

    let now = Utc::now();
    let cutoff = now - Duration::minutes(window_minutes);
    let (recent, dropped) = filter_recent(cutoff, raw);

    // Telemetry
    counter!("ingest_kept_total").increment(recent.len() as u64);
    counter!("ingest_window_dropped_total").increment(dropped as u64);
    gauge!("ingest_last_run_ts").set(now.timestamp() as f64);

    recent
}
