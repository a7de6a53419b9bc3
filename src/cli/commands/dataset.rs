//! Dataset import command.

use std::path::PathBuf;

use console::style;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::helpers::cancel_on_ctrl_c;
use crate::config::Settings;
use crate::dataset::{write_report, DatasetProcessor};

/// Import every dated CSV under `dir` (or the configured dataset directory).
pub async fn cmd_dataset(
    settings: &Settings,
    config_hash: &str,
    dir: Option<PathBuf>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| settings.dataset_dir.clone());
    if !dir.is_dir() {
        anyhow::bail!("Dataset directory not found: {}", dir.display());
    }

    settings.ensure_directories()?;
    let store = settings.open_store().await?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    info!(
        dir = %dir.display(),
        config_hash = %config_hash,
        row_limit = ?limit,
        recent_window_months = settings.recent_window_months,
        "Starting dataset import"
    );

    let processor = DatasetProcessor::new(
        store,
        settings.unknown_distinction,
        settings.recent_window_months,
    )
    .with_row_limit(limit);
    let stats = processor.process_dir(&dir, &cancel).await?;

    let mark = if cancel.is_cancelled() {
        style("!").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "{} Processed {} files ({} skipped)",
        mark, stats.files_processed, stats.files_skipped
    );
    for file in &stats.files {
        println!(
            "  {} {} [{}] rows {}, new {}, existing {}, awards +{}, removed from guide {}",
            style("·").dim(),
            file.file_name,
            if file.recent { "recent" } else { "historical" },
            file.rows,
            file.new_restaurants,
            file.existing_restaurants,
            file.awards_added,
            file.removed_from_guide
        );
    }
    println!(
        "  {:<22} {}",
        "Unique restaurants", stats.unique_restaurants
    );
    println!("  {:<22} {}", "Awards added", stats.awards_added);
    println!("  {:<22} {}", "Awards updated", stats.awards_updated);
    println!("  {:<22} {}", "Awards rejected", stats.awards_rejected);
    println!("  {:<22} {}", "Errors", stats.errors);

    match write_report(&stats, &settings.data_dir) {
        Ok(path) => println!("{} Report written to {}", style("✓").green(), path.display()),
        Err(e) => println!("{} Failed to write report: {}", style("!").yellow(), e),
    }

    Ok(())
}
