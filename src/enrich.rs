//! Article enrichment: full body text plus a candidate cover image for
//! each selected story. Every failure here is per-article; the pipeline
//! skips the article and continues.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};

use crate::normalize::clean_text;

/// What one article page yields after scraping.
#[derive(Debug, Clone, Default)]
pub struct ArticleContent {
    pub text: String,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait ArticleEnricher: Send + Sync {
    async fn fetch_article(&self, url: &str) -> Result<ArticleContent>;

    /// Store the cover image next to the rendered page; returns the local
    /// path. Failures leave the page imageless, they don't fail the run.
    async fn download_image(&self, url: &str, slug: &str, images_dir: &Path)
        -> Result<PathBuf>;
}

/// Containers tried in order for the article body; the first one holding
/// at least `MIN_PARAGRAPHS` paragraphs wins.
const BODY_SELECTORS: &[&str] = &[
    "article",
    "div[itemprop='articleBody']",
    "div[class*='article']",
    "div[class*='content']",
    "section",
    "main",
];

const MIN_PARAGRAPHS: usize = 3;

/// Paragraphs taken from the whole page when no container matches.
const FALLBACK_PARAGRAPHS: usize = 12;

/// Pull body text and a cover-image candidate out of one HTML document.
pub fn extract_content(html: &str) -> ArticleContent {
    let doc = Html::parse_document(html);

    // Cover image: og:image first, then twitter:image.
    let mut image_url = None;
    if let Ok(sel_meta) = Selector::parse("meta") {
        for prop in ["og:image", "twitter:image"] {
            for m in doc.select(&sel_meta) {
                let name = m
                    .value()
                    .attr("property")
                    .or_else(|| m.value().attr("name"));
                if name == Some(prop) {
                    if let Some(content) = m.value().attr("content") {
                        let content = content.trim();
                        if !content.is_empty() {
                            image_url = Some(content.to_string());
                            break;
                        }
                    }
                }
            }
            if image_url.is_some() {
                break;
            }
        }
    }

    // Body text: container cascade, then first-paragraphs fallback.
    let mut blocks: Vec<String> = Vec::new();
    if let Ok(sel_p) = Selector::parse("p") {
        for sel_str in BODY_SELECTORS {
            if let Ok(sel) = Selector::parse(sel_str) {
                if let Some(container) = doc.select(&sel).next() {
                    let ps: Vec<String> = container
                        .select(&sel_p)
                        .map(|p| p.text().collect::<Vec<_>>().join(" "))
                        .collect();
                    if ps.len() >= MIN_PARAGRAPHS {
                        blocks = ps;
                        break;
                    }
                }
            }
        }
        if blocks.is_empty() {
            blocks = doc
                .select(&sel_p)
                .take(FALLBACK_PARAGRAPHS)
                .map(|p| p.text().collect::<Vec<_>>().join(" "))
                .collect();
        }
    }

    ArticleContent {
        text: clean_text(&blocks.join(" ")),
        image_url,
    }
}

/// Enricher that fetches article pages over HTTP and scrapes them.
pub struct HttpEnricher {
    client: reqwest::Client,
}

impl HttpEnricher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArticleEnricher for HttpEnricher {
    async fn fetch_article(&self, url: &str) -> Result<ArticleContent> {
        let rsp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching article {url}"))?
            .error_for_status()
            .with_context(|| format!("article {url} returned non-2xx"))?;
        let html = rsp.text().await.context("reading article body")?;
        Ok(extract_content(&html))
    }

    /// The extension follows the response content type; bytes are stored
    /// as served.
    async fn download_image(
        &self,
        url: &str,
        slug: &str,
        images_dir: &Path,
    ) -> Result<PathBuf> {
        let rsp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching cover image {url}"))?
            .error_for_status()
            .with_context(|| format!("cover image {url} returned non-2xx"))?;

        let ext = match rsp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
        {
            t if t.contains("png") => "png",
            t if t.contains("webp") => "webp",
            t if t.contains("gif") => "gif",
            _ => "jpg",
        };

        let bytes = rsp.bytes().await.context("reading cover image body")?;
        tokio::fs::create_dir_all(images_dir)
            .await
            .with_context(|| format!("creating {}", images_dir.display()))?;
        let path = images_dir.join(format!("{slug}.{ext}"));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_og_image_and_article_body() {
        let html = r#"<html><head>
            <meta property="og:image" content=" https://cdn.example/cover.jpg ">
            </head><body>
            <article><p>First para.</p><p>Second para.</p><p>Third para.</p></article>
            </body></html>"#;
        let got = extract_content(html);
        assert_eq!(got.image_url.as_deref(), Some("https://cdn.example/cover.jpg"));
        assert_eq!(got.text, "First para. Second para. Third para.");
    }

    #[test]
    fn twitter_image_is_second_choice() {
        let html = r#"<html><head>
            <meta name="twitter:image" content="https://cdn.example/tw.jpg">
            </head><body><p>x</p></body></html>"#;
        let got = extract_content(html);
        assert_eq!(got.image_url.as_deref(), Some("https://cdn.example/tw.jpg"));
    }

    #[test]
    fn sparse_container_falls_back_to_page_paragraphs() {
        // <article> holds fewer than three paragraphs, so the page-wide
        // fallback collects everything instead.
        let html = r#"<html><body>
            <article><p>Lede only.</p></article>
            <p>Loose one.</p><p>Loose two.</p>
            </body></html>"#;
        let got = extract_content(html);
        assert_eq!(got.text, "Lede only. Loose one. Loose two.");
        assert!(got.image_url.is_none());
    }
}
