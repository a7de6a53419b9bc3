//! Detail extractor for live restaurant pages.
//!
//! Structural selectors are tried first. The page's JSON-LD block fills
//! whatever they miss, and the listing card fills coordinates and location.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::listing::DetailRequest;
use crate::models::RestaurantFact;
use crate::parser::{
    clean_text, map_price, parse_green_star, parse_phone_number, parse_year, split_unpack,
    UnknownDistinctionPolicy,
};

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("h1.data-sheet__title"));
static TEXT_BLOCK: LazyLock<Selector> = LazyLock::new(|| selector(".data-sheet__block--text"));
static CLASSIFICATION: LazyLock<Selector> =
    LazyLock::new(|| selector(".data-sheet__classification-item--content"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| selector(".data-sheet__description"));
static PHONE: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[data-event="CTA_tel"]"#));
static WEBSITE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a[data-event="CTA_website"]"#));
static SERVICES: LazyLock<Selector> =
    LazyLock::new(|| selector(".restaurant-details__services li"));
static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:image"]"#));
pub(crate) static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"script[type="application/ld+json"]"#));

/// Separator between price and cuisine on the data sheet.
const PRICE_CUISINE_SEPARATOR: &str = "·";

fn first_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|e| element_text(&e))
        .unwrap_or_default()
}

fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

fn first_attr(document: &Html, selector: &Selector, name: &str) -> String {
    document
        .select(selector)
        .next()
        .and_then(|e| e.value().attr(name))
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Restaurant fields recovered from a JSON-LD block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JsonLdRestaurant {
    pub name: String,
    pub address: String,
    pub locality: String,
    pub country: String,
    pub telephone: String,
    pub cuisine: String,
    pub latitude: String,
    pub longitude: String,
    pub award: String,
    pub image: String,
    pub year: i32,
}

fn value_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => clean_text(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| value_string(Some(v)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

impl JsonLdRestaurant {
    /// Parse the first restaurant object among the page's JSON-LD blocks.
    pub fn from_document(document: &Html) -> Option<Self> {
        document
            .select(&JSON_LD)
            .filter_map(|script| {
                serde_json::from_str::<Value>(&script.text().collect::<String>()).ok()
            })
            .find_map(|value| Self::from_value(&value))
    }

    fn from_value(value: &Value) -> Option<Self> {
        if let Value::Array(items) = value {
            return items.iter().find_map(Self::from_value);
        }
        let kind = value_string(value.get("@type"));
        if kind != "Restaurant" && value.get("review").is_none() {
            return None;
        }

        let address = value.get("address");
        let (street, locality, country) = match address {
            Some(Value::Object(_)) => {
                let street = [
                    value_string(address.and_then(|a| a.get("streetAddress"))),
                    value_string(address.and_then(|a| a.get("addressLocality"))),
                    value_string(address.and_then(|a| a.get("postalCode"))),
                    value_string(address.and_then(|a| a.get("addressCountry"))),
                ]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
                (
                    street,
                    value_string(address.and_then(|a| a.get("addressLocality"))),
                    value_string(address.and_then(|a| a.get("addressCountry"))),
                )
            }
            other => (value_string(other), String::new(), String::new()),
        };

        let published = value_string(value.get("review").and_then(|r| r.get("datePublished")));

        Some(Self {
            name: value_string(value.get("name")),
            address: street,
            locality,
            country,
            telephone: value_string(value.get("telephone")),
            cuisine: value_string(value.get("servesCuisine")),
            latitude: value_string(value.get("latitude")),
            longitude: value_string(value.get("longitude")),
            award: value_string(value.get("award")),
            image: value_string(value.get("image")),
            year: parse_year(&published),
        })
    }

    fn location(&self) -> String {
        match (self.locality.is_empty(), self.country.is_empty()) {
            (false, false) => format!("{}, {}", self.locality, self.country),
            (false, true) => self.locality.clone(),
            (true, false) => self.country.clone(),
            (true, true) => String::new(),
        }
    }
}

/// Extract a fact from a live detail page.
///
/// Never fails: anything not found is left empty, and `year` stays 0 when
/// the page carries no publication date.
pub fn extract_detail(
    html: &str,
    request: &DetailRequest,
    policy: UnknownDistinctionPolicy,
) -> RestaurantFact {
    let document = Html::parse_document(html);
    let json_ld = JsonLdRestaurant::from_document(&document).unwrap_or_default();

    let mut fact = RestaurantFact::new(&request.url);
    fact.name = first_text(&document, &TITLE);

    let blocks: Vec<String> = document
        .select(&TEXT_BLOCK)
        .map(|e| element_text(&e))
        .collect();
    if let Some(address) = blocks.first() {
        fact.address = address.clone();
    }
    if let Some(price_cuisine) = blocks.get(1) {
        let (price, cuisine) = split_unpack(price_cuisine, PRICE_CUISINE_SEPARATOR);
        fact.price = map_price(&price);
        fact.cuisine = cuisine;
    }

    let classifications: Vec<String> = document
        .select(&CLASSIFICATION)
        .map(|e| element_text(&e))
        .filter(|s| !s.is_empty())
        .collect();
    fact.green_star = classifications.iter().any(|c| parse_green_star(c));
    fact.distinction = classifications
        .iter()
        .find(|c| !parse_green_star(c))
        .and_then(|c| policy.resolve(c));

    fact.description = first_text(&document, &DESCRIPTION);
    fact.phone_number = parse_phone_number(&first_attr(&document, &PHONE, "href"));
    fact.website_url = first_attr(&document, &WEBSITE, "href");
    fact.facilities_and_services = document
        .select(&SERVICES)
        .map(|e| element_text(&e))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    let image = first_attr(&document, &OG_IMAGE, "content");
    fact.image_url = (!image.is_empty()).then_some(image);

    fact.location = request.location.clone();
    fact.latitude = request.latitude.clone();
    fact.longitude = request.longitude.clone();
    fact.year = json_ld.year;

    fill_from_json_ld(&mut fact, &json_ld, policy);

    if fact.distinction.is_none() {
        fact.distinction = request.distinction;
    }
    if let Some(seed) = &request.seed {
        fact.fill_from(seed);
    }
    fact
}

fn fill_from_json_ld(
    fact: &mut RestaurantFact,
    json_ld: &JsonLdRestaurant,
    policy: UnknownDistinctionPolicy,
) {
    fn fill(target: &mut String, source: &str) {
        if target.is_empty() {
            *target = source.to_string();
        }
    }

    fill(&mut fact.name, &json_ld.name);
    fill(&mut fact.address, &json_ld.address);
    fill(&mut fact.location, &json_ld.location());
    fill(&mut fact.cuisine, &json_ld.cuisine);
    fill(&mut fact.latitude, &json_ld.latitude);
    fill(&mut fact.longitude, &json_ld.longitude);
    if fact.phone_number.is_empty() {
        fact.phone_number = parse_phone_number(&json_ld.telephone);
    }
    if fact.image_url.is_none() && !json_ld.image.is_empty() {
        fact.image_url = Some(json_ld.image.clone());
    }
    if fact.distinction.is_none() && !json_ld.award.is_empty() {
        fact.distinction = policy.resolve(&json_ld.award);
    }
}
