//! One pipeline run, start to finish: poll feeds, pick the trend, enrich
//! it, summarize, render the page, announce. Per-feed and per-article
//! failures are isolated; a failed summarization or post is terminal for
//! the run and the next scheduled invocation is the retry mechanism.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::enrich::ArticleEnricher;
use crate::ingest::{self, types::FeedSource};
use crate::publish::blog::{build_slug, pick_hashtags, write_markdown};
use crate::publish::{Announcement, StatusPoster};
use crate::summarize::{summarize_or_truncate, Summarizer};
use crate::trend::select_trend;

/// Merged article text handed to the summarizer is capped here.
const MERGE_CAP_CHARS: usize = 8000;

/// Headlines shorter than this fall back to the first story's title.
const MIN_HEADLINE_CHARS: usize = 10;

/// Teaser word budget when the synopsis has fewer than two sentences.
const TEASER_MAX_WORDS: usize = 25;

#[derive(Debug)]
pub enum RunOutcome {
    /// A page was rendered (and the announcement posted, if configured).
    Published { page: PathBuf },
    /// Nothing to publish this run; normal, not an error.
    Skipped(&'static str),
}

/// Derive the page headline and the two-line teaser from the synopsis.
fn headline_and_teaser(summary: &str, first_title: &str, title_max: usize) -> (String, String) {
    let sentences: Vec<&str> = summary
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let teaser = if sentences.len() >= 2 {
        format!("{}. {}.", sentences[0], sentences[1])
    } else {
        let words: Vec<&str> = summary.split_whitespace().collect();
        if words.len() > TEASER_MAX_WORDS {
            format!("{}…", words[..TEASER_MAX_WORDS].join(" "))
        } else {
            words.join(" ")
        }
    };

    let mut headline = sentences
        .first()
        .map(|s| s.to_string())
        .unwrap_or_else(|| teaser.clone());
    if headline.chars().count() < MIN_HEADLINE_CHARS {
        headline = first_title.to_string();
    }
    if headline.chars().count() > title_max {
        headline = headline.chars().take(title_max).collect();
    }
    let headline = headline.trim_end_matches([' ', ',', '.', ';', '-']).to_string();

    (headline, teaser)
}

pub async fn run(
    config: &PipelineConfig,
    sources: &[Box<dyn FeedSource>],
    enricher: &dyn ArticleEnricher,
    summarizer: &dyn Summarizer,
    poster: &dyn StatusPoster,
) -> Result<RunOutcome> {
    // 1) Fetch recent feed entries.
    info!("step 1: fetch recent feed entries");
    let recent = ingest::run_once(sources, config.window_minutes).await;
    if recent.is_empty() {
        return Ok(RunOutcome::Skipped("no recent feed items"));
    }
    info!(count = recent.len(), "collected recent items");

    // 2) Cluster and pick the trend.
    info!("step 2: cluster and pick trend");
    let stories = select_trend(&recent, config.min_sources, config.max_merge);
    if stories.is_empty() {
        return Ok(RunOutcome::Skipped("no trend selected"));
    }
    info!(
        picked = stories.len(),
        sources = ?stories.iter().map(|s| s.source.as_str()).collect::<Vec<_>>(),
        "trend chosen"
    );

    // 3) Fetch article texts and a cover image, skip-and-continue.
    info!("step 3: fetch article texts and cover image");
    let mut texts: Vec<String> = Vec::new();
    let mut cover_url: Option<String> = None;
    for s in &stories {
        match enricher.fetch_article(&s.link).await {
            Ok(content) => {
                if !content.text.is_empty() {
                    texts.push(content.text);
                }
                if cover_url.is_none() {
                    cover_url = content.image_url;
                }
            }
            Err(e) => warn!(error = ?e, link = %s.link, "article fetch failed; skipping"),
        }
    }

    // Merged summarizer input: article texts, or the member titles when
    // scraping yielded nothing.
    let mut long_text = if texts.is_empty() {
        stories
            .iter()
            .map(|s| s.title.as_str())
            .collect::<Vec<_>>()
            .join(". ")
    } else {
        texts.join(" ")
    };
    if long_text.chars().count() > MERGE_CAP_CHARS {
        long_text = long_text.chars().take(MERGE_CAP_CHARS).collect();
    }

    // 4) Summarize (degrades to truncation inside).
    info!("step 4: summarize");
    let summary = summarize_or_truncate(summarizer, &long_text, config.summary_words).await;
    if summary.is_empty() {
        return Ok(RunOutcome::Skipped("empty summary"));
    }

    let (headline, teaser) = headline_and_teaser(&summary, &stories[0].title, config.title_max);
    let slug = build_slug(&headline);

    // Cover image download is best-effort; the page publishes without one.
    let mut image_path: Option<PathBuf> = None;
    if let Some(url) = &cover_url {
        match enricher.download_image(url, &slug, &config.images_dir).await {
            Ok(p) => image_path = Some(p),
            Err(e) => warn!(error = ?e, url = %url, "cover image download failed; continuing without"),
        }
    }

    // 5) Render the page.
    info!("step 5: render page");
    let page = write_markdown(
        &config.docs_dir,
        &slug,
        &headline,
        Utc::now(),
        image_path.as_deref(),
        &summary,
        &stories,
    )?;

    // 6) Post the announcement.
    info!("step 6: post announcement");
    let page_url = format!("{}/{}.html", config.base_url.trim_end_matches('/'), slug);
    let hashtags = pick_hashtags(&headline, &config.hashtags);
    let text = format!("{teaser}\n\nRead: {page_url}\n\n{hashtags}");
    poster
        .post(&Announcement {
            text,
            image: image_path,
        })
        .await
        .context("posting announcement")?;

    info!(page = %page.display(), "pipeline completed");
    Ok(RunOutcome::Published { page })
}
