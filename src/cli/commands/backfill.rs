//! Archive backfill command.

use std::sync::Arc;

use console::style;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::helpers::{cancel_on_ctrl_c, print_crawl_report};
use crate::archive::{BackfillRunner, WaybackIndex};
use crate::config::Settings;
use crate::scrapers::{CrawlSession, Fetcher};

/// Backfill award history for one restaurant or every stored one.
pub async fn cmd_backfill(
    settings: &Settings,
    config_hash: &str,
    url: Option<&str>,
    from_year: Option<i32>,
    to_year: Option<i32>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    if let (Some(from), Some(to)) = (from_year, to_year) {
        if from > to {
            anyhow::bail!("--from {} is after --to {}", from, to);
        }
    }

    settings.ensure_directories()?;
    let store = settings.open_store().await?;

    let profile = settings.archive.clone();
    let fetcher = Fetcher::new(
        profile.clone(),
        settings.user_agent.as_deref(),
        settings.timeout(),
        Some(settings.cache_dir.clone()),
    )?;

    let runner = BackfillRunner::new(
        Arc::new(WaybackIndex::new(fetcher.clone(), settings.cdx_url.clone())),
        Arc::new(fetcher),
        store,
        settings.unknown_distinction,
        profile.workers,
    )
    .with_years(from_year, to_year);

    let targets = runner.targets(url).await?;
    if targets.is_empty() {
        println!(
            "{} No restaurants to backfill; run `michelin scrape` or `michelin dataset` first",
            style("!").yellow()
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let session = Arc::new(CrawlSession::new(profile.max_urls, limit, cancel));

    info!(
        session = %session.id(),
        config_hash = %config_hash,
        restaurants = targets.len(),
        from = ?from_year,
        to = ?to_year,
        "Starting backfill"
    );

    let stats = runner.run(targets, session.clone()).await;
    print_crawl_report("Backfill", &stats, session.is_cancelled());
    Ok(())
}
