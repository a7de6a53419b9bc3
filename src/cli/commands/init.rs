//! Initialize command.

use console::style;

use crate::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    settings.open_store().await?;

    println!(
        "{} Initialized database at {}",
        style("✓").green(),
        settings.database_url()
    );
    if !settings.dataset_dir.exists() {
        println!(
            "{} Dataset directory {} does not exist yet",
            style("!").yellow(),
            settings.dataset_dir.display()
        );
    }
    println!(
        "{} Data directory: {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
