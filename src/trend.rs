//! # Trend Selector
//! Pure, testable logic that maps the run's headline stream to one
//! deduplicated trend. No I/O, suitable for unit tests and offline
//! evaluation.
//!
//! Policy: cluster titles on their normalized key; the cluster backed by
//! the most distinct outlets wins, recency breaks ties. A cluster below
//! the corroboration threshold is discarded in favor of the single
//! freshest item overall, so a run with any input always has something
//! to publish.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::ingest::types::FeedItem;
use crate::normalize::norm_key;

/// Pick the trend for this run. Returns between 0 and `max_merge` items
/// with pairwise-distinct links, in input order. Empty input yields an
/// empty result (nothing to publish, not an error).
pub fn select_trend(items: &[FeedItem], min_sources: usize, max_merge: usize) -> Vec<FeedItem> {
    if items.is_empty() {
        return Vec::new();
    }

    // 1) Partition by clustering key; order inside a group follows input order.
    let mut groups: BTreeMap<String, Vec<&FeedItem>> = BTreeMap::new();
    for item in items {
        groups.entry(norm_key(&item.title)).or_default().push(item);
    }

    // 2) Best cluster by (distinct source count, latest published), compared
    //    lexicographically. Iteration is key-ascending and strict `>` keeps
    //    the incumbent on a full tie, so identical score tuples resolve to
    //    the smallest key.
    let mut best: Option<(usize, DateTime<Utc>, &Vec<&FeedItem>)> = None;
    for members in groups.values() {
        let distinct = members
            .iter()
            .map(|m| m.source.as_str())
            .collect::<HashSet<_>>()
            .len();
        let latest = members
            .iter()
            .map(|m| m.published)
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let replace = match best {
            None => true,
            Some((d, l, _)) => (distinct, latest) > (d, l),
        };
        if replace {
            best = Some((distinct, latest, members));
        }
    }
    let Some((distinct, _, members)) = best else {
        return Vec::new();
    };

    // 3) Corroboration: the winner needs `min_sources` distinct outlets
    //    behind it, else fall back to the freshest single item across the
    //    whole ungrouped input (first one on equal timestamps).
    let chosen: Vec<&FeedItem> = if distinct < min_sources {
        tracing::info!(
            distinct_sources = distinct,
            min_sources,
            "no multi-source trend; falling back to freshest single story"
        );
        let mut freshest = &items[0];
        for it in &items[1..] {
            if it.published > freshest.published {
                freshest = it;
            }
        }
        vec![freshest]
    } else {
        members.clone()
    };

    // 4) Dedupe by link, first occurrence wins; 5) cap at max_merge.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut uniq: Vec<FeedItem> = Vec::new();
    for it in chosen {
        if uniq.len() == max_merge {
            break;
        }
        if seen.insert(it.link.as_str()) {
            uniq.push(it.clone());
        }
    }
    uniq
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 5, 12, min, 0).unwrap()
    }

    fn item(title: &str, source: &str, link: &str, published: DateTime<Utc>) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: link.to_string(),
            source: source.to_string(),
            published,
        }
    }

    #[test]
    fn identical_score_tuples_resolve_to_smallest_key() {
        // Two two-source clusters with equal latest timestamps; only the
        // normalized key differs. "cabinet reshuffle ..." < "monsoon ..."
        let items = vec![
            item("Monsoon floods northern districts", "S1", "l1", at(0)),
            item("Northern districts hit by monsoon floods", "S2", "l2", at(10)),
            item("Cabinet reshuffle announced today", "S3", "l3", at(0)),
            item("Today cabinet reshuffle announced", "S4", "l4", at(10)),
        ];
        let out = select_trend(&items, 2, 3);
        assert_eq!(
            out.iter().map(|i| i.link.as_str()).collect::<Vec<_>>(),
            vec!["l3", "l4"]
        );
        // Repeated calls agree (no map-iteration-order dependence).
        for _ in 0..10 {
            assert_eq!(select_trend(&items, 2, 3), out);
        }
    }

    #[test]
    fn all_stopword_titles_cluster_together_on_empty_key() {
        let items = vec![
            item("This and that", "S1", "l1", at(0)),
            item("Over and out", "S2", "l2", at(1)),
        ];
        // Both degenerate to the empty key: one cluster, two sources.
        let out = select_trend(&items, 2, 3);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn fallback_prefers_first_item_on_equal_timestamps() {
        let items = vec![
            item("Quake hits region", "S1", "l1", at(5)),
            item("Budget session begins", "S1", "l2", at(5)),
        ];
        let out = select_trend(&items, 2, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, "l1");
    }
}
