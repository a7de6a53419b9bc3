//! Michelin crawler - restaurant guide crawl and award reconciliation.
//!
//! Crawls the live guide, replays web archive captures and imports dated
//! dataset files into a single SQLite award timeline.

use michelin_crawler::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging: --log-level wins over -v
    let default_filter = match cli::log_level() {
        Some(level) => format!("michelin_crawler={}", level),
        None if cli::is_verbose() => "michelin_crawler=debug".to_string(),
        None => "michelin_crawler=info".to_string(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
