pub mod blog;
pub mod twitter;

use std::path::PathBuf;

/// What goes out to the social endpoint once the page is rendered.
#[derive(Debug, Clone)]
pub struct Announcement {
    /// Teaser + page link + hashtags; posters adapt length to their platform.
    pub text: String,
    /// Local cover image to attach, if one was downloaded.
    pub image: Option<PathBuf>,
}

#[async_trait::async_trait]
pub trait StatusPoster: Send + Sync {
    /// Post the announcement. An unconfigured poster logs and returns Ok;
    /// a configured poster that fails returns the error (terminal for the
    /// run — the next scheduled invocation is the retry).
    async fn post(&self, announcement: &Announcement) -> anyhow::Result<()>;
    fn name(&self) -> &'static str;
}
