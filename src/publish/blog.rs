//! Static page rendering: slug, hashtags, and the Markdown document.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::FeedItem;

/// Longest slug stem kept before the uniqueness suffix.
const SLUG_STEM_MAX: usize = 80;

/// URL-safe slug: alphanumeric runs joined by `-`, capped, plus a
/// 6-hex-digit suffix so similar headlines from different runs don't
/// overwrite each other.
pub fn build_slug(title: &str) -> String {
    static RE_NON_ALNUM: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_NON_ALNUM.get_or_init(|| regex::Regex::new(r"[^A-Za-z0-9]+").unwrap());

    let stem: String = re
        .replace_all(title.trim(), "-")
        .chars()
        .take(SLUG_STEM_MAX)
        .collect();
    let stem = stem.trim_matches('-');

    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    let digest = hasher.finalize();
    let suffix: String = digest.iter().take(3).map(|b| format!("{b:02x}")).collect();

    if stem.is_empty() {
        suffix
    } else {
        format!("{stem}-{suffix}")
    }
}

/// Configured base tags plus up to two title-cased words from the headline.
pub fn pick_hashtags(title: &str, base: &[String]) -> String {
    static RE_WORD: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_WORD.get_or_init(|| regex::Regex::new(r"[A-Za-z]{4,}").unwrap());

    let mut tags: Vec<String> = base.to_vec();
    for m in re.find_iter(title).take(2) {
        tags.push(format!("#{}", title_case(m.as_str())));
    }
    tags.join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
        }
        None => String::new(),
    }
}

/// Render the trend as a Markdown page under `docs_dir`. The cover image
/// is referenced relative to the page (`images/<file>`), which is where
/// the enricher stores it. Returns the page path.
pub fn write_markdown(
    docs_dir: &Path,
    slug: &str,
    headline: &str,
    published: DateTime<Utc>,
    image_path: Option<&Path>,
    summary: &str,
    sources: &[FeedItem],
) -> Result<PathBuf> {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# {headline}\n"));
    lines.push(format!(
        "*Published:* {}\n",
        published.format("%d %B %Y, %H:%M UTC")
    ));
    if let Some(img) = image_path {
        if let Some(name) = img.file_name().and_then(|n| n.to_str()) {
            lines.push(format!("![cover](images/{name})\n"));
        }
    }
    lines.push(format!("{}\n", summary.trim()));
    lines.push("**Sources:**".to_string());
    for s in sources {
        lines.push(format!("- [{}]({})", s.source, s.link));
    }
    let content = lines.join("\n") + "\n";

    fs::create_dir_all(docs_dir)
        .with_context(|| format!("creating {}", docs_dir.display()))?;
    let path = docs_dir.join(format!("{slug}.md"));
    fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote page");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slug_is_url_safe_and_suffixed() {
        let slug = build_slug("Quake hits region: 3 dead, dozens hurt!");
        assert!(slug.starts_with("Quake-hits-region-3-dead-dozens-hurt-"));
        let suffix = slug.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!slug.starts_with('-') && !slug.ends_with('-'));
    }

    #[test]
    fn empty_title_still_gets_a_slug() {
        let slug = build_slug("???");
        assert_eq!(slug.len(), 6);
    }

    #[test]
    fn hashtags_take_base_then_two_long_words() {
        let tags = pick_hashtags(
            "monsoon floods paralyse the city",
            &["#Trendwire".to_string()],
        );
        assert_eq!(tags, "#Trendwire #Monsoon #Floods");
    }

    #[test]
    fn markdown_page_has_expected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![FeedItem {
            title: "Quake hits region".to_string(),
            link: "https://example.test/quake".to_string(),
            source: "Example Wire".to_string(),
            published: Utc.with_ymd_and_hms(2025, 8, 5, 12, 0, 0).unwrap(),
        }];
        let page = write_markdown(
            dir.path(),
            "quake-abc123",
            "Quake hits region",
            Utc.with_ymd_and_hms(2025, 8, 5, 12, 30, 0).unwrap(),
            Some(Path::new("docs/images/quake-abc123.jpg")),
            "A strong quake struck the region.",
            &sources,
        )
        .unwrap();

        let body = fs::read_to_string(&page).unwrap();
        assert!(body.starts_with("# Quake hits region\n"));
        assert!(body.contains("*Published:* 05 August 2025, 12:30 UTC"));
        assert!(body.contains("![cover](images/quake-abc123.jpg)"));
        assert!(body.contains("A strong quake struck the region."));
        assert!(body.contains("- [Example Wire](https://example.test/quake)"));
    }
}
