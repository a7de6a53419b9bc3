//! Field parsers that turn raw extracted strings into canonical values.
//!
//! Everything here is pure: no I/O except the filename-date fallback, which
//! reads file metadata.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::models::Distinction;

static RE_THREE_STARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(three|3)\b.*?\bstars?\b").unwrap());
static RE_TWO_STARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(two|2)\b.*?\bstars?\b").unwrap());
static RE_ONE_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(one|1)\b.*?\bstar\b").unwrap());
static RE_BIB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bbib\b").unwrap());
static RE_SELECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bselected\s*restaurants?\b|\bplate\b").unwrap());
static RE_FILENAME_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Date layouts accepted for published dates, tried in order.
const DATE_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// What to do with a distinction string that matches no known tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownDistinctionPolicy {
    /// Classify as Selected Restaurants.
    #[default]
    Selected,
    /// Leave the distinction empty so no award is written.
    Skip,
}

impl UnknownDistinctionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::Skip => "skip",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "selected" => Some(Self::Selected),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    /// Resolve a raw distinction string under this policy.
    pub fn resolve(&self, raw: &str) -> Option<Distinction> {
        match (classify_distinction(raw), self) {
            (Some(d), _) => Some(d),
            (None, Self::Selected) => Some(Distinction::SelectedRestaurants),
            (None, Self::Skip) => None,
        }
    }
}

/// Split a "left · right" string into two trimmed halves.
///
/// With no separator the whole string is returned as the right half, since
/// listing cards drop the price before they drop the cuisine.
pub fn split_unpack(s: &str, separator: &str) -> (String, String) {
    if s.is_empty() {
        return (String::new(), String::new());
    }
    match s.split_once(separator) {
        Some((left, right)) => (left.trim().to_string(), right.trim().to_string()),
        None => (String::new(), s.trim().to_string()),
    }
}

/// Collapse whitespace runs and decode the handful of entities the guide emits.
pub fn clean_text(s: &str) -> String {
    let decoded = s
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&bull;", "")
        .replace('•', "");
    RE_WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Classify a distinction string, returning `None` when nothing matches.
pub fn classify_distinction(raw: &str) -> Option<Distinction> {
    let lowered = raw.to_lowercase().replace("&bull;", "").replace('•', "");
    let s = lowered
        .trim_matches(|c: char| " .!?,;:-".contains(c))
        .trim();

    if RE_THREE_STARS.is_match(s) {
        Some(Distinction::ThreeStars)
    } else if RE_TWO_STARS.is_match(s) {
        Some(Distinction::TwoStars)
    } else if RE_ONE_STAR.is_match(s) {
        Some(Distinction::OneStar)
    } else if RE_BIB.is_match(s) {
        Some(Distinction::BibGourmand)
    } else if RE_SELECTED.is_match(s) {
        Some(Distinction::SelectedRestaurants)
    } else {
        None
    }
}

pub fn parse_green_star(raw: &str) -> bool {
    clean_text(raw).to_lowercase() == "michelin green star"
}

/// Normalize a phone number to E.164. Unparseable input yields an empty string.
pub fn parse_phone_number(raw: &str) -> String {
    let raw = raw.trim().trim_start_matches("tel:");
    if raw.is_empty() {
        return String::new();
    }
    match phonenumber::parse(None, raw) {
        Ok(number) => number.format().mode(phonenumber::Mode::E164).to_string(),
        Err(_) => String::new(),
    }
}

/// Map price category codes to dollar tiers. Unknown codes pass through.
pub fn map_price(code: &str) -> String {
    match code {
        "CAT_P01" => "$".to_string(),
        "CAT_P02" => "$$".to_string(),
        "CAT_P03" => "$$$".to_string(),
        "CAT_P04" => "$$$$".to_string(),
        other => other.to_string(),
    }
}

/// Parse a guide year from a date string or a bare 4-digit year. Returns 0
/// when no layout matches.
pub fn parse_year(value: &str) -> i32 {
    let value = value.trim();
    if value.is_empty() {
        return 0;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.year();
    }
    for layout in DATE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, layout) {
            return dt.year();
        }
    }
    if value.len() == 4 {
        if let Ok(year) = value.parse::<i32>() {
            return year;
        }
    }
    0
}

/// Extract a `YYYY-MM-DD` date embedded in a filename.
pub fn parse_date_from_filename(file_name: &str) -> Option<NaiveDate> {
    let caps = RE_FILENAME_DATE.captures(file_name)?;
    let date = format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()
}

/// Date of a dataset file: from its filename, else its modification time.
pub fn parse_date_from_path_with_fallback(path: &Path) -> std::io::Result<NaiveDate> {
    if let Some(date) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_date_from_filename)
    {
        return Ok(date);
    }
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified).date_naive())
}

/// Read a value from `name['key'] = 'value'` assignments in inline scripts.
///
/// Object literal syntax (`{ 'key': 'value' }`) is not recognized and yields
/// `None`.
pub fn parse_layer_value(script: &str, key: &str) -> Option<String> {
    let pattern = format!(r"{}'\]\s*=\s*'([^']*)'", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    re.captures(script).map(|caps| caps[1].to_string())
}
