//! Award models: one distinction per restaurant per guide year.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Award tier, from highest to lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Distinction {
    ThreeStars,
    TwoStars,
    OneStar,
    BibGourmand,
    SelectedRestaurants,
}

impl Distinction {
    /// All distinctions in listing crawl order.
    pub const ALL: [Distinction; 5] = [
        Distinction::ThreeStars,
        Distinction::TwoStars,
        Distinction::OneStar,
        Distinction::BibGourmand,
        Distinction::SelectedRestaurants,
    ];

    /// Label stored in the database and read by downstream queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeStars => "3 Stars",
            Self::TwoStars => "2 Stars",
            Self::OneStar => "1 Star",
            Self::BibGourmand => "Bib Gourmand",
            Self::SelectedRestaurants => "Selected Restaurants",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "3 Stars" => Some(Self::ThreeStars),
            "2 Stars" => Some(Self::TwoStars),
            "1 Star" => Some(Self::OneStar),
            "Bib Gourmand" => Some(Self::BibGourmand),
            "Selected Restaurants" => Some(Self::SelectedRestaurants),
            _ => None,
        }
    }

    /// Listing path on the guide site for this distinction.
    pub fn listing_path(&self) -> &'static str {
        match self {
            Self::ThreeStars => "/en/restaurants/3-stars-michelin",
            Self::TwoStars => "/en/restaurants/2-stars-michelin",
            Self::OneStar => "/en/restaurants/1-star-michelin",
            Self::BibGourmand => "/en/restaurants/bib-gourmand",
            Self::SelectedRestaurants => "/en/restaurants/the-plate-michelin",
        }
    }
}

impl std::fmt::Display for Distinction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an award slot's current value came from.
///
/// `Scrape` covers live crawls and recent dataset rows; `Backfill` covers
/// archive snapshots and historical dataset rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Scrape,
    Backfill,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::Backfill => "backfill",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scrape" => Some(Self::Scrape),
            "backfill" => Some(Self::Backfill),
            _ => None,
        }
    }
}

/// A stored award row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub id: i32,
    pub restaurant_id: i32,
    pub year: i32,
    pub distinction: Distinction,
    pub price: String,
    pub green_star: bool,
    pub provenance: Provenance,
    /// Archive snapshot the value was read from, if any.
    pub wayback_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The award half of a fact, ready for the merge policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardFact {
    pub year: i32,
    pub distinction: Distinction,
    pub price: String,
    pub green_star: bool,
    pub provenance: Provenance,
    pub wayback_url: Option<String>,
}

impl AwardFact {
    /// Whether a stored award already holds this value with the same
    /// provenance. An incoming snapshot reference must also match the stored
    /// one; a fact without a snapshot accepts whatever is stored.
    pub fn matches(&self, award: &Award) -> bool {
        award.year == self.year
            && award.distinction == self.distinction
            && award.price == self.price
            && award.green_star == self.green_star
            && award.provenance == self.provenance
            && match &self.wayback_url {
                Some(url) => award.wayback_url.as_ref() == Some(url),
                None => true,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinction_labels_roundtrip() {
        for d in Distinction::ALL {
            assert_eq!(Distinction::from_str(d.as_str()), Some(d));
        }
        assert_eq!(Distinction::from_str("2 stars"), None);
    }

    #[test]
    fn test_distinction_ordering_is_by_tier() {
        assert!(Distinction::ThreeStars < Distinction::OneStar);
        assert!(Distinction::BibGourmand < Distinction::SelectedRestaurants);
    }
}
