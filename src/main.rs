//! Trendwire — Binary Entrypoint
//! One pipeline run per invocation; scheduling (cron, CI timer) lives
//! outside the process, and the next invocation is the retry mechanism.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trendwire::config::load_config_default;
use trendwire::enrich::HttpEnricher;
use trendwire::ingest::providers::RssFeedSource;
use trendwire::ingest::types::FeedSource;
use trendwire::pipeline::{self, RunOutcome};
use trendwire::publish::twitter::TwitterPoster;
use trendwire::summarize::build_summarizer;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendwire=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = load_config_default().context("loading pipeline config")?;
    if config.feeds.is_empty() {
        tracing::warn!("no feeds configured; the run will have nothing to publish");
    }

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(12))
        .build()
        .context("building http client")?;

    let sources: Vec<Box<dyn FeedSource>> = config
        .feeds
        .iter()
        .map(|url| {
            Box::new(RssFeedSource::new(
                url.clone(),
                client.clone(),
                config.per_feed_cap,
            )) as Box<dyn FeedSource>
        })
        .collect();
    let enricher = HttpEnricher::new(client.clone());
    let summarizer = build_summarizer(&config.summarizer);
    let poster = TwitterPoster::from_env(client);

    match pipeline::run(&config, &sources, &enricher, summarizer.as_ref(), &poster).await? {
        RunOutcome::Published { page } => {
            info!(page = %page.display(), "published");
        }
        RunOutcome::Skipped(reason) => {
            info!(reason, "nothing to publish this run");
        }
    }
    Ok(())
}
