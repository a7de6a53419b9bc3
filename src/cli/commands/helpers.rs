//! Shared helper functions for CLI commands.

use console::style;
use tokio_util::sync::CancellationToken;

use crate::scrapers::CrawlStats;

/// Map the `0 = unlimited` flag convention to an option.
pub fn limit_option(limit: usize) -> Option<usize> {
    (limit > 0).then_some(limit)
}

/// Cancel `token` on the first Ctrl-C. In-flight requests finish; nothing new
/// is dispatched.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Interrupted, finishing in-flight requests",
                style("!").yellow()
            );
            token.cancel();
        }
    });
}

/// Print the end-of-run counters of a crawl or backfill.
pub fn print_crawl_report(title: &str, stats: &CrawlStats, interrupted: bool) {
    let mark = if interrupted {
        style("!").yellow()
    } else {
        style("✓").green()
    };
    println!("{} {} finished{}", mark, title, if interrupted { " (interrupted)" } else { "" });

    let rows = [
        ("Discovered", stats.discovered),
        ("Queued", stats.queued),
        ("Fetched", stats.fetched),
        ("Cache hits", stats.cache_hits),
        ("Retries", stats.retries),
        ("Abandoned", stats.abandoned),
        ("Skipped", stats.skipped),
        ("Incomplete", stats.incomplete),
        ("Errors", stats.errors),
    ];
    for (label, value) in rows {
        println!("  {:<22} {}", label, value);
    }

    println!("  {}", style("Restaurants").bold());
    println!("  {:<22} {}", "created", stats.restaurants_created);
    println!("  {:<22} {}", "updated", stats.restaurants_updated);
    println!("  {:<22} {}", "unchanged", stats.restaurants_unchanged);

    println!("  {}", style("Awards").bold());
    println!("  {:<22} {}", "created", stats.awards_created);
    println!("  {:<22} {}", "updated", stats.awards_updated);
    println!("  {:<22} {}", "unchanged", stats.awards_unchanged);
    println!("  {:<22} {}", "rejected", stats.awards_rejected);
    println!("  {:<22} {}", "without distinction", stats.awards_skipped);

    if stats.errors > 0 || stats.abandoned > 0 {
        println!(
            "{} {} URLs failed; see the log for details",
            style("!").yellow(),
            stats.errors + stats.abandoned
        );
    }
}
