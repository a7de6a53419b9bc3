//! Wayback Machine CDX API utilities: query URLs, response rows and
//! timestamps.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Wayback Machine CDX API base URL.
pub const WAYBACK_CDX_API_URL: &str = "https://web.archive.org/cdx/search/cdx";

/// Builder for CDX API query URLs.
pub struct CdxQuery {
    base_url: String,
    url_pattern: String,
    fields: Vec<String>,
    filters: Vec<String>,
    from_year: Option<i32>,
    to_year: Option<i32>,
}

impl CdxQuery {
    pub fn new(url_pattern: impl Into<String>) -> Self {
        Self {
            base_url: WAYBACK_CDX_API_URL.to_string(),
            url_pattern: url_pattern.into(),
            fields: Vec::new(),
            filters: Vec::new(),
            from_year: None,
            to_year: None,
        }
    }

    /// Override the CDX API base URL (for testing or alternative instances).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the fields to return (`fl=` parameter).
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Append a filter (`filter=` parameter). Can be called multiple times.
    pub fn filter(mut self, f: impl Into<String>) -> Self {
        self.filters.push(f.into());
        self
    }

    /// First capture year to include.
    pub fn from_year(mut self, year: Option<i32>) -> Self {
        self.from_year = year;
        self
    }

    /// Last capture year to include.
    pub fn to_year(mut self, year: Option<i32>) -> Self {
        self.to_year = year;
        self
    }

    /// Build the final CDX API URL.
    pub fn build(&self) -> String {
        // Encode the URL pattern but preserve CDX wildcard characters (*).
        let encoded_pattern = urlencoding::encode(&self.url_pattern).replace("%2A", "*");
        let mut url = format!("{}?url={}&output=json", self.base_url, encoded_pattern);

        if !self.fields.is_empty() {
            url.push_str(&format!("&fl={}", self.fields.join(",")));
        }
        for f in &self.filters {
            url.push_str(&format!("&filter={}", f));
        }
        if let Some(from) = self.from_year {
            url.push_str(&format!("&from={}", from));
        }
        if let Some(to) = self.to_year {
            url.push_str(&format!("&to={}", to));
        }

        url
    }
}

/// Errors from CDX response parsing.
#[derive(Debug, Error)]
pub enum CdxParseError {
    #[error("Empty CDX response")]
    Empty,
    #[error("Failed to parse CDX JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single row from a CDX JSON response with named field access.
#[derive(Debug, Clone)]
pub struct CdxRow {
    fields: HashMap<String, String>,
}

impl CdxRow {
    /// Get a field value by name.
    ///
    /// Returns `None` for missing fields and CDX null markers (`"-"`).
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|s| s.as_str())
            .filter(|s| *s != "-" && !s.is_empty())
    }
}

/// Parse a CDX JSON response body into named-field rows.
///
/// The CDX API with `output=json` returns `Vec<Vec<String>>` where the first
/// row contains field names and subsequent rows contain data. An empty JSON
/// array means no captures.
pub fn parse_cdx_response(body: &str) -> Result<Vec<CdxRow>, CdxParseError> {
    if body.trim().is_empty() {
        return Err(CdxParseError::Empty);
    }

    let rows: Vec<Vec<String>> = serde_json::from_str(body)?;

    let headers = match rows.first() {
        Some(h) if !h.is_empty() => h.clone(),
        _ => return Ok(Vec::new()),
    };

    let result = rows
        .into_iter()
        .skip(1)
        .map(|row| {
            let fields = headers
                .iter()
                .zip(row)
                .map(|(k, v)| (k.clone(), v))
                .collect();
            CdxRow { fields }
        })
        .collect();

    Ok(result)
}

/// Parse a CDX timestamp (`YYYYMMDDhhmmss`) into `DateTime<Utc>`.
pub fn parse_cdx_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if ts.len() < 14 || !ts.is_char_boundary(14) {
        return None;
    }
    NaiveDateTime::parse_from_str(&ts[..14], "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Raw archive URL (no toolbar or link rewriting) for a capture.
pub fn build_raw_archive_url(timestamp: &str, original_url: &str) -> String {
    format!(
        "https://web.archive.org/web/{}id_/{}",
        timestamp, original_url
    )
}
