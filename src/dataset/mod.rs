//! Bulk ingest of dated dataset CSV snapshots.

pub mod processor;
pub mod report;

pub use processor::{
    find_dataset_files, sort_files_by_date, DatasetError, DatasetFile, DatasetProcessor,
    DatasetStats, FileStats, DATASET_COLUMNS,
};
pub use report::{render_report, write_report};
