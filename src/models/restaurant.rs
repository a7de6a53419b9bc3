//! Restaurant model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder coordinate used when a source carries no position.
pub const UNKNOWN_COORDINATE: &str = "0.0";

/// A restaurant keyed by its canonical guide URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i32,
    pub url: String,
    pub name: String,
    pub description: String,
    pub address: String,
    /// Free-text location label, e.g. "Paris, France".
    pub location: String,
    pub latitude: String,
    pub longitude: String,
    pub cuisine: String,
    pub facilities_and_services: String,
    /// E.164 when parseable, otherwise empty.
    pub phone_number: String,
    pub website_url: String,
    pub image_url: Option<String>,
    /// Whether the restaurant currently appears in the live guide.
    pub in_guide: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Restaurant {
    /// Whether a website URL is available for dataset matching.
    pub fn has_website(&self) -> bool {
        !self.website_url.is_empty()
    }
}
