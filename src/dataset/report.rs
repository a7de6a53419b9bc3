//! Markdown summary of a dataset run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::models::Distinction;

use super::processor::DatasetStats;

/// File name for a report produced at `stats.finished_at`.
pub fn report_file_name(stats: &DatasetStats) -> String {
    format!(
        "dataset_processing_report_{}.md",
        stats.finished_at.format("%Y%m%d_%H%M%S")
    )
}

/// Render the report body.
pub fn render_report(stats: &DatasetStats) -> String {
    let mut out = String::new();
    let duration = stats.finished_at - stats.started_at;

    let _ = writeln!(out, "# Dataset Processing Report");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Generated: {}",
        stats.finished_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Duration: {}s", duration.num_seconds());
    let _ = writeln!(out);

    let _ = writeln!(out, "## Overview");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Count |");
    let _ = writeln!(out, "|--------|-------|");
    for (label, value) in [
        ("Files processed", stats.files_processed),
        ("Files skipped", stats.files_skipped),
        ("Unique restaurants", stats.unique_restaurants),
        ("New restaurants", stats.new_restaurants),
        ("Existing restaurants", stats.existing_restaurants),
        ("Awards added", stats.awards_added),
        ("Awards updated", stats.awards_updated),
        ("Awards unchanged", stats.awards_unchanged),
        ("Awards rejected", stats.awards_rejected),
        ("Skipped rows", stats.skipped_rows),
        ("Errors", stats.errors),
    ] {
        let _ = writeln!(out, "| {} | {} |", label, value);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Files");
    let _ = writeln!(out);
    if stats.files.is_empty() {
        let _ = writeln!(out, "No files were processed.");
    } else {
        let _ = writeln!(
            out,
            "| File | Date | Kind | Rows | Skipped | New | Existing | Awards added | Awards rejected | Errors | Removed from guide |"
        );
        let _ = writeln!(
            out,
            "|------|------|------|------|---------|-----|----------|--------------|-----------------|--------|--------------------|"
        );
        for file in &stats.files {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                file.file_name,
                file.date,
                if file.recent { "recent" } else { "historical" },
                file.rows,
                file.skipped_rows,
                file.new_restaurants,
                file.existing_restaurants,
                file.awards_added,
                file.awards_rejected,
                file.errors,
                file.removed_from_guide,
            );
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Awards by Distinction");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Distinction | Awards written |");
    let _ = writeln!(out, "|-------------|----------------|");
    for distinction in Distinction::ALL {
        let count = stats.by_distinction.get(&distinction).copied().unwrap_or(0);
        let _ = writeln!(out, "| {} | {} |", distinction.as_str(), count);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let attempted = stats.files_processed + stats.files_skipped;
    let success_rate = if attempted == 0 {
        0.0
    } else {
        stats.files_processed as f64 / attempted as f64 * 100.0
    };
    let _ = writeln!(
        out,
        "{} of {} files processed ({:.1}%).",
        stats.files_processed, attempted, success_rate
    );
    let removed: usize = stats.files.iter().map(|f| f.removed_from_guide).sum();
    if removed > 0 {
        let _ = writeln!(out, "{} restaurants marked as no longer in the guide.", removed);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Notes");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Files are applied oldest first.");
    let _ = writeln!(
        out,
        "- Recent files set guide membership; historical files only add awards."
    );
    let _ = writeln!(
        out,
        "- Existing restaurants are matched by website URL, then by guide URL."
    );

    out
}

/// Write the report into `dir`, returning its path.
pub fn write_report(stats: &DatasetStats, dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(stats));
    std::fs::write(&path, render_report(stats))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::processor::DatasetProcessor;
    use crate::parser::UnknownDistinctionPolicy;
    use crate::repository::{migrations::run_migrations, DieselFactStore, SqlitePool};
    use chrono::NaiveDate;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_report_written_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("t.db").display());
        run_migrations(&url).await.unwrap();
        let store = DieselFactStore::new(SqlitePool::new(&url));

        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(
            data.join("2020-02-01.csv"),
            "Name,Address,Location,Price,Type,Longitude,Latitude,PhoneNumber,Url,WebsiteUrl,Classification\n\
             A,1 Rue,Lyon,€€,French,4.8,45.7,,https://guide.michelin.com/en/x/restaurant/a,,2 Stars\n",
        )
        .unwrap();

        let stats = DatasetProcessor::new(store, UnknownDistinctionPolicy::Selected, 30)
            .with_today(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .process_dir(&data, &CancellationToken::new())
            .await
            .unwrap();

        let path = write_report(&stats, dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("dataset_processing_report_"));
        assert!(name.ends_with(".md"));

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("| Files processed | 1 |"));
        assert!(body.contains("| 2020-02-01.csv | 2020-02-01 | historical | 1 | 0 | 1 | 0 | 1 | 0 | 0 | 0 |"));
        assert!(body.contains("| 2 Stars | 1 |"));
        assert!(body.contains("1 of 1 files processed (100.0%)."));
    }

    #[test]
    fn test_report_without_files() {
        let stats = DatasetStats::default();
        let body = render_report(&stats);
        assert!(body.contains("No files were processed."));
        assert!(body.contains("0 of 0 files processed (0.0%)."));
    }
}
