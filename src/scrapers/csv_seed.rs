//! Seed file of known guide URLs for a targeted scrape.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::http_client::FetchConfig;
use super::listing::DetailRequest;
use crate::models::{RestaurantFact, UNKNOWN_COORDINATE};
use crate::parser::{clean_text, UnknownDistinctionPolicy};

/// Description stored for seeded restaurants whose page has none.
pub const SEED_DESCRIPTION: &str = "Restaurant information from Michelin Guide";

#[derive(Debug, Deserialize)]
struct SeedRow {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Location", default)]
    location: String,
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(rename = "Cuisine", default)]
    cuisine: String,
    #[serde(rename = "Award", default)]
    award: String,
    #[serde(rename = "Price", default)]
    price: String,
    #[serde(rename = "Address", default)]
    address: String,
}

impl SeedRow {
    fn into_request(self, policy: UnknownDistinctionPolicy) -> DetailRequest {
        let distinction = if self.award.is_empty() {
            None
        } else {
            policy.resolve(&self.award)
        };

        let mut seed = RestaurantFact::new(&self.url);
        seed.name = clean_text(&self.name);
        seed.location = clean_text(&self.location);
        seed.cuisine = clean_text(&self.cuisine);
        seed.address = clean_text(&self.address);
        seed.price = self.price.trim().to_string();
        seed.latitude = UNKNOWN_COORDINATE.to_string();
        seed.longitude = UNKNOWN_COORDINATE.to_string();
        seed.description = SEED_DESCRIPTION.to_string();
        seed.distinction = distinction;

        let mut request = DetailRequest::new(self.url);
        request.distinction = distinction;
        request.location = seed.location.clone();
        request.seed = Some(seed);
        request
    }
}

/// Read detail requests from a seed CSV with columns
/// `Name, Location, URL, Cuisine, Award, Price, Address`.
///
/// Rows with an empty URL or a URL outside the guide site are skipped.
pub fn read_seed_file(
    path: &Path,
    policy: UnknownDistinctionPolicy,
) -> Result<Vec<DetailRequest>, csv::Error> {
    let site = FetchConfig::primary_site();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut requests = Vec::new();
    for (line, row) in reader.deserialize::<SeedRow>().enumerate() {
        let row = row?;
        if row.url.is_empty() || !site.allows(&row.url) {
            debug!(line = line + 2, url = %row.url, "Skipping seed row without a guide URL");
            continue;
        }
        requests.push(row.into_request(policy));
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Distinction;

    #[test]
    fn test_read_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.csv");
        std::fs::write(
            &path,
            "Name,Location,URL,Cuisine,Award,Price,Address\n\
             Alpha,\"Paris, France\",https://guide.michelin.com/en/paris/restaurant/alpha,French,2 Stars,$$$$,1 Rue A\n\
             Nowhere,Oslo,,Nordic,1 Star,$$,\n\
             Elsewhere,Rome,https://example.com/r/1,Italian,Bib Gourmand,$,\n",
        )
        .unwrap();

        let requests = read_seed_file(&path, UnknownDistinctionPolicy::Selected).unwrap();
        assert_eq!(requests.len(), 1);

        let request = &requests[0];
        assert_eq!(request.distinction, Some(Distinction::TwoStars));
        assert_eq!(request.location, "Paris, France");
        let seed = request.seed.as_ref().unwrap();
        assert_eq!(seed.name, "Alpha");
        assert_eq!(seed.latitude, UNKNOWN_COORDINATE);
        assert_eq!(seed.description, SEED_DESCRIPTION);
    }
}
