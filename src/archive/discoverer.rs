//! Snapshot discovery through the archive's CDX index.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use super::cdx::{
    build_raw_archive_url, parse_cdx_response, parse_cdx_timestamp, CdxParseError, CdxQuery,
    CdxRow,
};
use crate::scrapers::{CrawlSession, FetchError, Fetcher};

/// CDX fields requested for every lookup.
const CDX_FIELDS: &[&str] = &["timestamp", "original", "statuscode", "digest", "length"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Archive index request failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] CdxParseError),
}

/// One usable capture of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: String,
    pub original: String,
    pub digest: String,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Raw capture URL to fetch.
    pub fn archive_url(&self) -> String {
        build_raw_archive_url(&self.timestamp, &self.original)
    }

    pub fn year(&self) -> i32 {
        self.captured_at.year()
    }
}

/// Keep captures that stored real content, dropping consecutive duplicates.
///
/// A row is usable when it has status 200, a digest, a non-zero length and a
/// well-formed timestamp. A capture whose digest equals the previous usable
/// capture's adds nothing and is skipped.
pub fn filter_snapshots(rows: &[CdxRow]) -> Vec<Snapshot> {
    let mut snapshots: Vec<Snapshot> = Vec::new();

    for row in rows {
        if row.get("statuscode") != Some("200") {
            continue;
        }
        let Some(digest) = row.get("digest") else {
            continue;
        };
        if !matches!(row.get("length"), Some(len) if len != "0") {
            continue;
        }
        let (Some(timestamp), Some(original)) = (row.get("timestamp"), row.get("original")) else {
            continue;
        };
        let Some(captured_at) = parse_cdx_timestamp(timestamp) else {
            continue;
        };
        if snapshots.last().is_some_and(|prev| prev.digest == digest) {
            continue;
        }

        snapshots.push(Snapshot {
            timestamp: timestamp.to_string(),
            original: original.to_string(),
            digest: digest.to_string(),
            captured_at,
        });
    }

    snapshots
}

/// Lookup of archived captures for a page URL.
#[async_trait]
pub trait ArchiveIndex: Send + Sync {
    /// Usable captures of `url` in capture order, optionally bounded by year.
    async fn snapshots(
        &self,
        url: &str,
        from_year: Option<i32>,
        to_year: Option<i32>,
        session: &CrawlSession,
    ) -> Result<Vec<Snapshot>, DiscoveryError>;
}

/// The Wayback Machine CDX API.
#[derive(Clone)]
pub struct WaybackIndex {
    fetcher: Fetcher,
    cdx_url: String,
}

impl WaybackIndex {
    pub fn new(fetcher: Fetcher, cdx_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            cdx_url: cdx_url.into(),
        }
    }

    pub fn query_url(&self, url: &str, from_year: Option<i32>, to_year: Option<i32>) -> String {
        CdxQuery::new(url)
            .base_url(&self.cdx_url)
            .fields(CDX_FIELDS)
            .filter("statuscode:200")
            .from_year(from_year)
            .to_year(to_year)
            .build()
    }
}

#[async_trait]
impl ArchiveIndex for WaybackIndex {
    async fn snapshots(
        &self,
        url: &str,
        from_year: Option<i32>,
        to_year: Option<i32>,
        session: &CrawlSession,
    ) -> Result<Vec<Snapshot>, DiscoveryError> {
        let query = self.query_url(url, from_year, to_year);
        let page = self.fetcher.fetch_uncached(&query, session).await?;

        let rows = match parse_cdx_response(&page.body) {
            Ok(rows) => rows,
            Err(CdxParseError::Empty) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let snapshots = filter_snapshots(&rows);
        debug!(
            url = %url,
            captures = rows.len(),
            usable = snapshots.len(),
            "Archive index lookup"
        );
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::FetchConfig;
    use std::time::Duration;

    const URL: &str = "https://guide.michelin.com/en/paris/restaurant/alpha";

    #[test]
    fn test_filter_drops_incomplete_captures() {
        let body = format!(
            r#"[
            ["timestamp","original","statuscode","digest","length"],
            ["20180101000000","{u}","200","AAA","5120"],
            ["20180601000000","{u}","302","BBB","310"],
            ["20190101000000","{u}","200","-","-"],
            ["20190601000000","{u}","200","CCC","4870"],
            ["20200101000000","{u}","200","DDD","5302"]
        ]"#,
            u = URL
        );
        let rows = parse_cdx_response(&body).unwrap();
        let snapshots = filter_snapshots(&rows);

        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].year(), 2018);
        assert_eq!(
            snapshots[1].archive_url(),
            format!("https://web.archive.org/web/20190601000000id_/{}", URL)
        );
        assert_eq!(snapshots[2].digest, "DDD");
    }

    #[test]
    fn test_filter_drops_consecutive_duplicates() {
        let body = format!(
            r#"[
            ["timestamp","original","statuscode","digest","length"],
            ["20180101000000","{u}","200","AAA","5120"],
            ["20180201000000","{u}","200","AAA","5120"],
            ["20180301000000","{u}","200","BBB","5000"],
            ["20180401000000","{u}","200","AAA","5120"],
            ["2018bad","{u}","200","CCC","5120"]
        ]"#,
            u = URL
        );
        let rows = parse_cdx_response(&body).unwrap();
        let stamps: Vec<String> = filter_snapshots(&rows)
            .into_iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(
            stamps,
            vec!["20180101000000", "20180301000000", "20180401000000"]
        );
    }

    #[test]
    fn test_query_url() {
        let fetcher =
            Fetcher::new(FetchConfig::archive(), None, Duration::from_secs(5), None).unwrap();
        let index = WaybackIndex::new(fetcher, crate::archive::WAYBACK_CDX_API_URL);
        let query = index.query_url(URL, Some(2017), Some(2020));
        assert!(query.starts_with("https://web.archive.org/cdx/search/cdx?url=https%3A%2F%2Fguide"));
        assert!(query.contains("&fl=timestamp,original,statuscode,digest,length"));
        assert!(query.contains("&filter=statuscode:200"));
        assert!(query.ends_with("&from=2017&to=2020"));
    }
}
