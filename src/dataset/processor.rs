//! Bulk ingest of dated dataset CSV files.
//!
//! Files are applied oldest first. A file dated within the recent window is
//! treated as the guide's current listing: its rows are marked in the guide,
//! and once the whole file is applied every other in-guide restaurant is
//! marked out. Older files only extend award timelines.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Months, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::{Distinction, FactOrigin, RestaurantFact, UNKNOWN_COORDINATE};
use crate::parser::{
    clean_text, parse_date_from_path_with_fallback, parse_phone_number, UnknownDistinctionPolicy,
};
use crate::repository::{ApplyOptions, AwardOutcome, DieselFactStore, RecordChange};

/// Header every dataset file must carry.
pub const DATASET_COLUMNS: [&str; 11] = [
    "Name",
    "Address",
    "Location",
    "Price",
    "Type",
    "Longitude",
    "Latitude",
    "PhoneNumber",
    "Url",
    "WebsiteUrl",
    "Classification",
];

/// Price stored when a row has none.
const DEFAULT_PRICE: &str = "$";
/// Cuisine stored for new restaurants when a row has none.
const DEFAULT_CUISINE: &str = "Unknown";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{file}: missing columns {columns:?}")]
    MissingColumns { file: PathBuf, columns: Vec<String> },
    #[error("{file}: no date in filename or metadata: {source}")]
    NoDate {
        file: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct DatasetRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Type")]
    cuisine: String,
    #[serde(rename = "Longitude")]
    longitude: String,
    #[serde(rename = "Latitude")]
    latitude: String,
    #[serde(rename = "PhoneNumber")]
    phone_number: String,
    #[serde(rename = "Url")]
    url: String,
    #[serde(rename = "WebsiteUrl")]
    website_url: String,
    #[serde(rename = "Classification")]
    classification: String,
}

impl DatasetRow {
    fn into_fact(self, year: i32, recent: bool, policy: UnknownDistinctionPolicy) -> RestaurantFact {
        fn or_default(value: String, default: &str) -> String {
            if value.is_empty() {
                default.to_string()
            } else {
                value
            }
        }

        let description = if recent {
            "Restaurant from current dataset"
        } else {
            "Restaurant from historical dataset"
        };

        RestaurantFact {
            url: self.url,
            name: clean_text(&self.name),
            address: clean_text(&self.address),
            location: clean_text(&self.location),
            description: description.to_string(),
            cuisine: or_default(clean_text(&self.cuisine), DEFAULT_CUISINE),
            phone_number: parse_phone_number(&self.phone_number),
            website_url: self.website_url,
            latitude: or_default(self.latitude, UNKNOWN_COORDINATE),
            longitude: or_default(self.longitude, UNKNOWN_COORDINATE),
            price: or_default(self.price, DEFAULT_PRICE),
            distinction: policy.resolve(&self.classification),
            year,
            ..Default::default()
        }
    }
}

/// A dataset file with its resolved date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub path: PathBuf,
    pub date: NaiveDate,
}

impl DatasetFile {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Counters for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub file_name: String,
    pub date: NaiveDate,
    pub recent: bool,
    pub rows: usize,
    pub skipped_rows: usize,
    pub new_restaurants: usize,
    pub existing_restaurants: usize,
    pub awards_added: usize,
    pub awards_updated: usize,
    pub awards_unchanged: usize,
    pub awards_rejected: usize,
    pub errors: usize,
    pub removed_from_guide: usize,
}

impl FileStats {
    fn new(file: &DatasetFile, recent: bool) -> Self {
        Self {
            file_name: file.file_name(),
            date: file.date,
            recent,
            rows: 0,
            skipped_rows: 0,
            new_restaurants: 0,
            existing_restaurants: 0,
            awards_added: 0,
            awards_updated: 0,
            awards_unchanged: 0,
            awards_rejected: 0,
            errors: 0,
            removed_from_guide: 0,
        }
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub files_processed: usize,
    pub files_skipped: usize,
    /// Distinct restaurants across all files, keyed by guide URL.
    pub unique_restaurants: usize,
    pub new_restaurants: usize,
    pub existing_restaurants: usize,
    pub awards_added: usize,
    pub awards_updated: usize,
    pub awards_unchanged: usize,
    pub awards_rejected: usize,
    pub errors: usize,
    pub skipped_rows: usize,
    /// Awards added or updated, per distinction.
    pub by_distinction: BTreeMap<Distinction, usize>,
    /// Per-file counters in processing order.
    pub files: Vec<FileStats>,
}

impl Default for DatasetStats {
    fn default() -> Self {
        let now = Local::now();
        Self {
            started_at: now,
            finished_at: now,
            files_processed: 0,
            files_skipped: 0,
            unique_restaurants: 0,
            new_restaurants: 0,
            existing_restaurants: 0,
            awards_added: 0,
            awards_updated: 0,
            awards_unchanged: 0,
            awards_rejected: 0,
            errors: 0,
            skipped_rows: 0,
            by_distinction: BTreeMap::new(),
            files: Vec::new(),
        }
    }
}

impl DatasetStats {
    fn absorb(&mut self, file: &FileStats) {
        self.new_restaurants += file.new_restaurants;
        self.existing_restaurants += file.existing_restaurants;
        self.awards_added += file.awards_added;
        self.awards_updated += file.awards_updated;
        self.awards_unchanged += file.awards_unchanged;
        self.awards_rejected += file.awards_rejected;
        self.errors += file.errors;
        self.skipped_rows += file.skipped_rows;
    }
}

/// Every `*.csv` file under `dir`, recursively.
pub fn find_dataset_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
            {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Resolve each file's date and order them oldest first. A file with no
/// resolvable date is logged and left out.
pub fn sort_files_by_date(paths: Vec<PathBuf>) -> Vec<DatasetFile> {
    let mut files: Vec<DatasetFile> = paths
        .into_iter()
        .filter_map(|path| match parse_date_from_path_with_fallback(&path) {
            Ok(date) => Some(DatasetFile { path, date }),
            Err(source) => {
                warn!("Skipping dataset file: {}", DatasetError::NoDate { file: path, source });
                None
            }
        })
        .collect();
    files.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    files
}

/// Applies dataset files to the fact store.
pub struct DatasetProcessor {
    store: DieselFactStore,
    policy: UnknownDistinctionPolicy,
    recent_window: Months,
    row_limit: Option<usize>,
    today: NaiveDate,
}

impl DatasetProcessor {
    pub fn new(
        store: DieselFactStore,
        policy: UnknownDistinctionPolicy,
        recent_window_months: u32,
    ) -> Self {
        Self {
            store,
            policy,
            recent_window: Months::new(recent_window_months),
            row_limit: None,
            today: Local::now().date_naive(),
        }
    }

    /// Process at most `limit` rows per file.
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit.filter(|n| *n > 0);
        self
    }

    /// Reference date for the recent window.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Whether a file dated `date` describes the current guide: dated on or
    /// after the same day `recent_window` calendar months before today.
    pub fn is_recent(&self, date: NaiveDate) -> bool {
        match self.today.checked_sub_months(self.recent_window) {
            Some(cutoff) => date >= cutoff,
            None => true,
        }
    }

    /// Process every dataset file under `dir`, oldest first.
    ///
    /// A file that cannot be dated or read is counted as skipped and the run
    /// moves on.
    pub async fn process_dir(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<DatasetStats, DatasetError> {
        let paths = find_dataset_files(dir)?;
        let found = paths.len();
        let files = sort_files_by_date(paths);
        let undated = found - files.len();
        info!(dir = %dir.display(), count = files.len(), undated, "Found dataset files");

        let mut stats = self.process_files(&files, cancel).await?;
        stats.files_skipped += undated;
        Ok(stats)
    }

    pub async fn process_files(
        &self,
        files: &[DatasetFile],
        cancel: &CancellationToken,
    ) -> Result<DatasetStats, DatasetError> {
        let mut stats = DatasetStats::default();
        let mut seen = HashSet::new();

        for file in files {
            if cancel.is_cancelled() {
                warn!("Dataset run cancelled");
                break;
            }
            info!(
                file = %file.path.display(),
                date = %file.date,
                recent = self.is_recent(file.date),
                "Processing dataset file"
            );
            match self.process_file(file, &mut seen, &mut stats, cancel).await {
                Ok(file_stats) => {
                    stats.absorb(&file_stats);
                    stats.files.push(file_stats);
                    stats.files_processed += 1;
                }
                Err(e) => {
                    error!(file = %file.path.display(), "Failed to process dataset file: {}", e);
                    stats.files_skipped += 1;
                }
            }
        }

        stats.unique_restaurants = seen.len();
        stats.finished_at = Local::now();
        Ok(stats)
    }

    async fn process_file(
        &self,
        file: &DatasetFile,
        seen: &mut HashSet<String>,
        stats: &mut DatasetStats,
        cancel: &CancellationToken,
    ) -> Result<FileStats, DatasetError> {
        let recent = self.is_recent(file.date);
        let mut file_stats = FileStats::new(file, recent);
        let rows = self.read_rows(file, &mut file_stats)?;

        let total = rows.len();
        let rows: Vec<DatasetRow> = match self.row_limit {
            Some(limit) if total > limit => {
                info!(limit, total, "Applying row limit");
                rows.into_iter().take(limit).collect()
            }
            _ => rows,
        };
        let truncated = rows.len() < total;

        let origin = FactOrigin::Dataset {
            file_name: file_stats.file_name.clone(),
            recent,
        };
        let options = ApplyOptions::for_origin(&origin);
        let mut listed = HashSet::new();

        let progress = ProgressBar::new(rows.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        progress.set_message(file_stats.file_name.clone());

        let mut interrupted = false;
        for row in rows {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            seen.insert(row.url.clone());
            if recent {
                if !row.website_url.is_empty() {
                    listed.insert(row.website_url.clone());
                }
                listed.insert(row.url.clone());
            }

            let fact = row.into_fact(file.year(), recent, self.policy);
            match self.store.apply_fact(&fact, &origin, options).await {
                Ok(outcome) => {
                    match outcome.restaurant {
                        RecordChange::Created => file_stats.new_restaurants += 1,
                        _ => file_stats.existing_restaurants += 1,
                    }
                    let counted = match outcome.award {
                        AwardOutcome::Created => {
                            file_stats.awards_added += 1;
                            true
                        }
                        AwardOutcome::Updated => {
                            file_stats.awards_updated += 1;
                            true
                        }
                        AwardOutcome::Unchanged => {
                            file_stats.awards_unchanged += 1;
                            false
                        }
                        AwardOutcome::Rejected(_) => {
                            file_stats.awards_rejected += 1;
                            false
                        }
                        AwardOutcome::Skipped => false,
                    };
                    if let (true, Some(distinction)) = (counted, fact.distinction) {
                        *stats.by_distinction.entry(distinction).or_insert(0) += 1;
                    }
                }
                Err(e) => {
                    error!(url = %fact.url, name = %fact.name, "Failed to apply dataset row: {}", e);
                    file_stats.errors += 1;
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        if recent {
            if truncated || interrupted {
                warn!(
                    file = %file_stats.file_name,
                    "Not every row was applied; leaving guide membership untouched"
                );
            } else {
                match self.store.clear_in_guide_except(&listed).await {
                    Ok(cleared) => {
                        file_stats.removed_from_guide = cleared;
                        if cleared > 0 {
                            info!(count = cleared, "Marked restaurants as no longer in guide");
                        }
                    }
                    Err(e) => error!("Failed to update guide membership: {}", e),
                }
            }
        }

        info!(
            file = %file_stats.file_name,
            rows = file_stats.rows,
            new = file_stats.new_restaurants,
            existing = file_stats.existing_restaurants,
            awards_added = file_stats.awards_added,
            awards_rejected = file_stats.awards_rejected,
            removed_from_guide = file_stats.removed_from_guide,
            "Finished dataset file"
        );
        Ok(file_stats)
    }

    /// Parse a file's rows, skipping malformed ones and rows without a name
    /// or guide URL.
    fn read_rows(
        &self,
        file: &DatasetFile,
        file_stats: &mut FileStats,
    ) -> Result<Vec<DatasetRow>, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&file.path)?;

        let headers = reader.headers()?.clone();
        let missing: Vec<String> = DATASET_COLUMNS
            .iter()
            .filter(|column| !headers.iter().any(|h| h == **column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns {
                file: file.path.clone(),
                columns: missing,
            });
        }

        let mut rows = Vec::new();
        for (index, row) in reader.deserialize::<DatasetRow>().enumerate() {
            let line = index + 2;
            file_stats.rows += 1;
            match row {
                Ok(row) if row.name.is_empty() || row.url.is_empty() => {
                    debug!(line, name = %row.name, "Skipping row without name or URL");
                    file_stats.skipped_rows += 1;
                }
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(line, "Skipping malformed row: {}", e);
                    file_stats.skipped_rows += 1;
                }
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{migrations::run_migrations, SqlitePool};
    use crate::models::Provenance;

    const HEADER: &str =
        "Name,Address,Location,Price,Type,Longitude,Latitude,PhoneNumber,Url,WebsiteUrl,Classification";

    fn guide(slug: &str) -> String {
        format!("https://guide.michelin.com/en/x/restaurant/{}", slug)
    }

    fn row(name: &str, slug: &str, website: &str, classification: &str) -> String {
        format!(
            "{},1 Main St,Paris,€€€,French,2.35,48.85,,{},{},{}",
            name,
            guide(slug),
            website,
            classification
        )
    }

    fn write_file(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut body = String::from(HEADER);
        for row in rows {
            body.push('\n');
            body.push_str(row);
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    async fn setup(dir: &Path) -> DieselFactStore {
        let url = format!("sqlite:{}", dir.join("t.db").display());
        run_migrations(&url).await.unwrap();
        DieselFactStore::new(SqlitePool::new(&url))
    }

    fn processor(store: &DieselFactStore) -> DatasetProcessor {
        DatasetProcessor::new(store.clone(), UnknownDistinctionPolicy::Selected, 1)
            .with_today(NaiveDate::from_ymd_opt(2025, 4, 10).unwrap())
    }

    #[test]
    fn test_files_sorted_chronologically() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(data.join("nested")).unwrap();
        let c = write_file(&data, "2025-03-01.csv", &[]);
        let a = write_file(&data.join("nested"), "guide_2021-01-01.csv", &[]);
        let b = write_file(&data, "2023-06-01_export.CSV", &[]);
        std::fs::write(data.join("notes.txt"), "x").unwrap();

        let files = sort_files_by_date(find_dataset_files(&data).unwrap());
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![a, b, c]);
        assert_eq!(files[0].year(), 2021);
    }

    #[test]
    fn test_undated_file_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let dated = write_file(dir.path(), "2022-01-01.csv", &[]);
        let missing = dir.path().join("export.csv");

        let files = sort_files_by_date(vec![missing, dated.clone()]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, dated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_undated_file_counts_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup(dir.path()).await;
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        write_file(&data, "2019-05-01.csv", &[row("A", "a", "", "1 Star")]);
        std::os::unix::fs::symlink(dir.path().join("gone.csv"), data.join("export.csv")).unwrap();

        let stats = processor(&store)
            .process_dir(&data, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.awards_added, 1);
    }

    #[test]
    fn test_recent_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = DieselFactStore::new(SqlitePool::new(&format!(
            "sqlite:{}",
            dir.path().join("unused.db").display()
        )));
        let p = processor(&store);
        assert!(p.is_recent(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()));
        assert!(p.is_recent(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()));
        assert!(!p.is_recent(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()));
        assert!(!p.is_recent(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));

        let month_end = DatasetProcessor::new(store, UnknownDistinctionPolicy::Selected, 1)
            .with_today(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert!(month_end.is_recent(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()));
        assert!(!month_end.is_recent(NaiveDate::from_ymd_opt(2025, 2, 27).unwrap()));
    }

    #[test]
    fn test_row_defaults() {
        let row = DatasetRow {
            name: "A".to_string(),
            address: String::new(),
            location: "Paris".to_string(),
            price: String::new(),
            cuisine: String::new(),
            longitude: String::new(),
            latitude: String::new(),
            phone_number: "not a number".to_string(),
            url: guide("a"),
            website_url: String::new(),
            classification: "3 Stars".to_string(),
        };
        let fact = row.into_fact(2020, false, UnknownDistinctionPolicy::Selected);
        assert_eq!(fact.price, "$");
        assert_eq!(fact.cuisine, "Unknown");
        assert_eq!(fact.latitude, "0.0");
        assert_eq!(fact.phone_number, "");
        assert_eq!(fact.description, "Restaurant from historical dataset");
        assert_eq!(fact.distinction, Some(Distinction::ThreeStars));
        assert_eq!(fact.year, 2020);
    }

    #[tokio::test]
    async fn test_recent_file_updates_guide_membership() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup(dir.path()).await;

        // C is listed before the recent file arrives.
        let c = RestaurantFact {
            url: guide("c"),
            name: "C".to_string(),
            distinction: Some(Distinction::OneStar),
            year: 2024,
            ..Default::default()
        };
        store
            .apply_fact(&c, &FactOrigin::LiveCrawl, ApplyOptions::live_crawl())
            .await
            .unwrap();

        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        write_file(
            &data,
            "2025-04-01_guide.csv",
            &[
                row("A", "a", "https://a.example", "1 Star"),
                row("B", "b", "", "Bib Gourmand"),
                row("", "nameless", "", "1 Star"),
            ],
        );

        let stats = processor(&store)
            .process_dir(&data, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.new_restaurants, 2);
        assert_eq!(stats.skipped_rows, 1);
        assert_eq!(stats.files[0].removed_from_guide, 1);
        assert_eq!(stats.by_distinction.get(&Distinction::OneStar), Some(&1));

        for slug in ["a", "b"] {
            let r = store.find_by_url(&guide(slug)).await.unwrap().unwrap();
            assert!(r.in_guide, "{} should be in guide", slug);
            assert_eq!(r.description, "Restaurant from current dataset");
        }
        let c = store.find_by_url(&guide("c")).await.unwrap().unwrap();
        assert!(!c.in_guide);

        let a = store.find_by_url(&guide("a")).await.unwrap().unwrap();
        let awards = store.awards_for(a.id).await.unwrap();
        assert_eq!(awards[0].year, 2025);
        assert_eq!(awards[0].provenance, Provenance::Scrape);
    }

    #[tokio::test]
    async fn test_historical_file_never_flips_in_guide() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup(dir.path()).await;

        // A is known only from the archive, so it is not in the guide.
        let archived = RestaurantFact {
            url: guide("a"),
            name: "A".to_string(),
            distinction: Some(Distinction::TwoStars),
            year: 2024,
            ..Default::default()
        };
        let snapshot = FactOrigin::ArchiveSnapshot {
            snapshot_url: "https://web.archive.org/web/20240301000000id_/a".to_string(),
        };
        store
            .apply_fact(&archived, &snapshot, ApplyOptions::backfill())
            .await
            .unwrap();
        let stale = store.find_by_url(&guide("a")).await.unwrap().unwrap();
        assert!(!stale.in_guide);

        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        write_file(
            &data,
            "2019-05-01.csv",
            &[row("A", "a", "", "1 Star"), row("D", "d", "", "2 Stars")],
        );
        write_file(&data, "2018-05-01.csv", &[row("A", "a", "", "Bib Gourmand")]);

        let stats = processor(&store)
            .process_dir(&data, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files[0].date, NaiveDate::from_ymd_opt(2018, 5, 1).unwrap());
        assert_eq!(stats.unique_restaurants, 2);
        assert_eq!(stats.awards_added, 3);

        let a = store.find_by_url(&guide("a")).await.unwrap().unwrap();
        assert!(!a.in_guide);
        let years: Vec<i32> = store
            .awards_for(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|aw| aw.year)
            .collect();
        assert_eq!(years, vec![2018, 2019, 2024]);

        let d = store.find_by_url(&guide("d")).await.unwrap().unwrap();
        assert!(!d.in_guide);
        assert_eq!(d.description, "Restaurant from historical dataset");
    }

    #[tokio::test]
    async fn test_missing_columns_skips_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup(dir.path()).await;
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("2020-01-01.csv"), "Name,Url\nA,https://x").unwrap();

        let stats = processor(&store)
            .process_dir(&data, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.files_processed, 0);
        assert_eq!(stats.files_skipped, 1);
    }
}
