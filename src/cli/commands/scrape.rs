//! Live guide scrape command.

use std::path::Path;
use std::sync::Arc;

use console::style;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::helpers::{cancel_on_ctrl_c, print_crawl_report};
use crate::config::Settings;
use crate::scrapers::{csv_seed::read_seed_file, CrawlSession, FetchConfig, Fetcher, LiveCrawler};

/// Crawl the live guide, or only the restaurants listed in `csv`.
pub async fn cmd_scrape(
    settings: &Settings,
    config_hash: &str,
    limit: Option<usize>,
    conservative: bool,
    csv: Option<&Path>,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let store = settings.open_store().await?;

    let mut profile = settings.crawl.clone();
    if conservative {
        let slow = FetchConfig::conservative();
        profile.delay = profile.delay.max(slow.delay);
        profile.random_delay = profile.random_delay.max(slow.random_delay);
    }

    let fetcher = Fetcher::new(
        profile.clone(),
        settings.user_agent.as_deref(),
        settings.timeout(),
        Some(settings.cache_dir.clone()),
    )?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let session = Arc::new(CrawlSession::new(profile.max_urls, limit, cancel));

    info!(
        session = %session.id(),
        config_hash = %config_hash,
        conservative,
        limit = ?limit,
        delay_ms = profile.delay.as_millis() as u64,
        workers = profile.workers,
        "Starting scrape"
    );

    let crawler = LiveCrawler::new(fetcher, store, settings.unknown_distinction);
    let stats = match csv {
        Some(path) => {
            let requests = read_seed_file(path, settings.unknown_distinction)?;
            println!(
                "{} Loaded {} restaurants from {}",
                style("✓").green(),
                requests.len(),
                path.display()
            );
            crawler.run_requests(requests, session.clone()).await
        }
        None => crawler.run(session.clone()).await,
    };

    print_crawl_report("Scrape", &stats, session.is_cancelled());
    Ok(())
}
