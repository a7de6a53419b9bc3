//! Web archive backfill: snapshot discovery, legacy page extraction and the
//! backfill runner.

pub mod backfill;
pub mod cdx;
pub mod discoverer;
pub mod extract;

pub use backfill::{BackfillRunner, PageSource};
pub use cdx::{CdxParseError, WAYBACK_CDX_API_URL};
pub use discoverer::{filter_snapshots, ArchiveIndex, DiscoveryError, Snapshot, WaybackIndex};
pub use extract::{detect_format, extract_snapshot, PageFormat, SnapshotExtraction};
