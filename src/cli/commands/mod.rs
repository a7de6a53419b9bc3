//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod backfill;
mod dataset;
mod helpers;
mod init;
mod scrape;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "michelin")]
#[command(about = "Crawl the restaurant guide and reconcile yearly award timelines")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Value of `--log-level`, read before argument parsing so logging can be
/// installed first.
pub fn log_level() -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == "--log-level" {
            return args.next();
        }
        if let Some(level) = arg.strip_prefix("--log-level=") {
            return Some(level.to_string());
        }
    }
    None
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and database
    Init,

    /// Crawl the live guide and merge every detail page
    Scrape {
        /// Limit number of detail pages to fetch (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Use the slower request spacing
        #[arg(long)]
        conservative: bool,
        /// Scrape only the restaurants listed in this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Recover past awards from web archive captures
    Backfill {
        /// Backfill a single restaurant by guide URL
        url: Option<String>,
        /// First capture year to consider
        #[arg(long)]
        from: Option<i32>,
        /// Last capture year to consider
        #[arg(long)]
        to: Option<i32>,
        /// Limit number of archived pages to fetch (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// Import dated dataset CSV files
    Dataset {
        /// Directory to scan (defaults to the configured dataset directory)
        dir: Option<PathBuf>,
        /// Limit number of rows per file, for testing (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Show restaurant and award counts
    Status,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (settings, config) = load_settings_with_options(options).await;
    let config_hash = config.hash();

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Scrape {
            limit,
            conservative,
            csv,
            log_level: _,
        } => {
            scrape::cmd_scrape(
                &settings,
                &config_hash,
                helpers::limit_option(limit),
                conservative,
                csv.as_deref(),
            )
            .await
        }
        Commands::Backfill {
            url,
            from,
            to,
            limit,
        } => {
            backfill::cmd_backfill(
                &settings,
                &config_hash,
                url.as_deref(),
                from,
                to,
                helpers::limit_option(limit),
            )
            .await
        }
        Commands::Dataset {
            dir,
            limit,
            log_level: _,
        } => {
            dataset::cmd_dataset(
                &settings,
                &config_hash,
                dir,
                helpers::limit_option(limit),
            )
            .await
        }
        Commands::Status => status::cmd_status(&settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_backfill_single_url() {
        let cli = Cli::try_parse_from([
            "michelin",
            "backfill",
            "https://guide.michelin.com/en/x/restaurant/a",
            "--from",
            "2017",
        ])
        .unwrap();
        match cli.command {
            Commands::Backfill { url, from, to, limit } => {
                assert_eq!(url.as_deref(), Some("https://guide.michelin.com/en/x/restaurant/a"));
                assert_eq!(from, Some(2017));
                assert_eq!(to, None);
                assert_eq!(limit, 0);
            }
            _ => panic!("expected backfill"),
        }
    }

    #[test]
    fn test_parse_scrape_flags() {
        let cli = Cli::try_parse_from([
            "michelin",
            "-v",
            "scrape",
            "--limit",
            "10",
            "--conservative",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Scrape {
                limit,
                conservative,
                csv,
                log_level,
            } => {
                assert_eq!(limit, 10);
                assert!(conservative);
                assert!(csv.is_none());
                assert_eq!(log_level.as_deref(), Some("debug"));
            }
            _ => panic!("expected scrape"),
        }
    }
}
