//! Facts: normalized field bundles extracted from a single page or row.

use super::{AwardFact, Distinction, Provenance};

/// Where a fact was observed. Carried explicitly from fetch to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactOrigin {
    /// Live detail page on the guide site.
    LiveCrawl,
    /// Archived capture of a detail page.
    ArchiveSnapshot { snapshot_url: String },
    /// Row from a bulk dataset file.
    Dataset { file_name: String, recent: bool },
}

impl FactOrigin {
    pub fn provenance(&self) -> Provenance {
        match self {
            Self::LiveCrawl => Provenance::Scrape,
            Self::ArchiveSnapshot { .. } => Provenance::Backfill,
            Self::Dataset { recent: true, .. } => Provenance::Scrape,
            Self::Dataset { recent: false, .. } => Provenance::Backfill,
        }
    }

    pub fn wayback_url(&self) -> Option<&str> {
        match self {
            Self::ArchiveSnapshot { snapshot_url } => Some(snapshot_url),
            _ => None,
        }
    }
}

/// Restaurant and award fields extracted from one source document.
///
/// Empty strings mean "not found". A `year` of 0 means the page carried no
/// usable guide year, and `distinction` is `None` when no tier was recovered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestaurantFact {
    pub url: String,
    pub name: String,
    pub address: String,
    pub location: String,
    pub description: String,
    pub cuisine: String,
    pub phone_number: String,
    pub website_url: String,
    pub facilities_and_services: String,
    pub latitude: String,
    pub longitude: String,
    pub image_url: Option<String>,
    pub distinction: Option<Distinction>,
    pub price: String,
    pub green_star: bool,
    pub year: i32,
}

impl RestaurantFact {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// The award part of this fact, if it carries a distinction.
    pub fn award_fact(&self, origin: &FactOrigin) -> Option<AwardFact> {
        let distinction = self.distinction?;
        Some(AwardFact {
            year: self.year,
            distinction,
            price: self.price.clone(),
            green_star: self.green_star,
            provenance: origin.provenance(),
            wayback_url: origin.wayback_url().map(str::to_string),
        })
    }

    /// Names of required fields that are missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.address.is_empty() {
            missing.push("address");
        }
        if self.latitude.is_empty() || self.longitude.is_empty() {
            missing.push("coordinates");
        }
        if self.description.is_empty() {
            missing.push("description");
        }
        if self.distinction.is_none() {
            missing.push("distinction");
        }
        missing
    }

    /// Fill empty fields from another fact without overriding found values.
    pub fn fill_from(&mut self, other: &RestaurantFact) {
        fn fill(target: &mut String, source: &str) {
            if target.is_empty() && !source.is_empty() {
                *target = source.to_string();
            }
        }
        fill(&mut self.name, &other.name);
        fill(&mut self.address, &other.address);
        fill(&mut self.location, &other.location);
        fill(&mut self.description, &other.description);
        fill(&mut self.cuisine, &other.cuisine);
        fill(&mut self.phone_number, &other.phone_number);
        fill(&mut self.website_url, &other.website_url);
        fill(&mut self.facilities_and_services, &other.facilities_and_services);
        fill(&mut self.latitude, &other.latitude);
        fill(&mut self.longitude, &other.longitude);
        fill(&mut self.price, &other.price);
        if self.image_url.is_none() {
            self.image_url = other.image_url.clone();
        }
        if self.distinction.is_none() {
            self.distinction = other.distinction;
        }
        if self.year <= 0 {
            self.year = other.year;
        }
        self.green_star |= other.green_star;
    }
}
