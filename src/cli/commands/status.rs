//! Status command.

use console::style;

use crate::config::Settings;

/// Print restaurant and award counts.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let store = settings.open_store().await?;
    let counts = store.counts().await?;
    let by_distinction = store.awards_by_distinction().await?;

    println!("{}", style("Michelin crawler status").bold());
    println!("  {:<22} {}", "Database", settings.database_url());
    println!("  {:<22} {}", "Restaurants", counts.restaurants);
    println!("  {:<22} {}", "In guide", counts.in_guide);
    println!(
        "  {:<22} {} ({} scrape, {} backfill)",
        "Awards", counts.awards, counts.scrape_awards, counts.backfill_awards
    );

    println!("\n{}", style("Awards by distinction").bold());
    for (distinction, count) in by_distinction {
        println!("  {:<22} {}", distinction.as_str(), count);
    }

    Ok(())
}
