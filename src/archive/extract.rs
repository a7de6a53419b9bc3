//! Extraction of restaurant facts from archived detail pages.
//!
//! Captures span several generations of the guide's markup. The format is
//! detected first, then the matching extractor runs. Values assigned in
//! inline `dLayer['key'] = 'value'` scripts fill whatever the markup lacks.
//! Nothing here fails: unknown layouts yield a partial fact without an award.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{Distinction, RestaurantFact};
use crate::parser::{
    classify_distinction, clean_text, map_price, parse_green_star, parse_layer_value,
    parse_phone_number, parse_year, split_unpack, UnknownDistinctionPolicy,
};
use crate::scrapers::{extract_detail, DetailRequest};

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static CURRENT_MARKER: LazyLock<Selector> =
    LazyLock::new(|| selector("h1.data-sheet__title, .data-sheet__classification-item--content"));
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static BODY: LazyLock<Selector> = LazyLock::new(|| selector("body"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:image"]"#));

// Restaurant-details layout.
static A_ROOT: LazyLock<Selector> = LazyLock::new(|| selector(".restaurant-details__heading"));
static A_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(".restaurant-details__heading--title"));
static A_DETAILS: LazyLock<Selector> =
    LazyLock::new(|| selector(".restaurant-details__heading--list li"));
static A_PRICE: LazyLock<Selector> =
    LazyLock::new(|| selector(".restaurant-details__heading-price"));
static A_CLASSIFICATION: LazyLock<Selector> =
    LazyLock::new(|| selector(".restaurant-details__classification--list li"));
static A_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".restaurant-details__description--text"));
static A_SERVICES: LazyLock<Selector> =
    LazyLock::new(|| selector(".restaurant-details__services--list li"));
static A_PHONE: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[href^="tel:"]"#));

// Point-of-interest layout.
static B_ROOT: LazyLock<Selector> = LazyLock::new(|| selector(".poi_intro-display-title"));
static B_ADDRESS: LazyLock<Selector> =
    LazyLock::new(|| selector(".poi_intro-display-address"));
static B_CUISINE: LazyLock<Selector> =
    LazyLock::new(|| selector(".poi_intro-display-cuisines"));
static B_PRICE: LazyLock<Selector> = LazyLock::new(|| selector(".poi_intro-display-prices"));
static B_DISTINCTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".poi_intro-display-michelin-distinction"));
static B_DISTINCTION_PARTS: LazyLock<Selector> = LazyLock::new(|| {
    selector(".poi_intro-display-michelin-distinction, .poi_intro-display-michelin-distinction *")
});
static B_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".poi_intro-display-description, .poi-comment"));
static B_PHONE: LazyLock<Selector> = LazyLock::new(|| selector(".poi_intro-display-phone"));

static RE_GUIDE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)michelin\s+guide[^0-9<]{0,40}?\b((?:19|20)\d{2})\b").unwrap()
});

/// Markup generation of an archived page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    /// Data-sheet markup, as served today.
    Current,
    /// `restaurant-details__*` markup.
    LegacyA,
    /// `poi_intro-display-*` markup.
    LegacyB,
    /// No usable markup, but `dLayer` assignments in inline scripts.
    InlineScript,
    Unrecognized,
}

impl PageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::LegacyA => "legacy-a",
            Self::LegacyB => "legacy-b",
            Self::InlineScript => "inline-script",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Result of extracting one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotExtraction {
    pub format: PageFormat,
    pub fact: RestaurantFact,
}

/// Key/value pairs assigned in `dLayer[...]` statements.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct LayerValues {
    name: String,
    distinction: String,
    price: String,
    cuisine: String,
    city: String,
    year: String,
}

impl LayerValues {
    fn from_document(document: &Html) -> Self {
        let script: String = document
            .select(&SCRIPT)
            .map(|s| s.text().collect::<String>())
            .filter(|s| s.contains("dLayer"))
            .collect::<Vec<_>>()
            .join("\n");
        if script.is_empty() {
            return Self::default();
        }
        let value = |key: &str| {
            parse_layer_value(&script, key)
                .map(|v| clean_text(&v))
                .unwrap_or_default()
        };
        Self {
            name: value("restaurant_name"),
            distinction: value("distinction"),
            price: value("price"),
            cuisine: value("cuisine"),
            city: value("city"),
            year: value("guide_year"),
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn text_of(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

fn first_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|e| text_of(&e))
        .unwrap_or_default()
}

fn all_texts(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|e| text_of(&e))
        .filter(|s| !s.is_empty())
        .collect()
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

/// Guide year printed in the page text, e.g. "MICHELIN Guide France 2019".
fn guide_year(document: &Html) -> i32 {
    let text = first_text(document, &BODY);
    RE_GUIDE_YEAR
        .captures(&text)
        .map(|caps| parse_year(&caps[1]))
        .unwrap_or(0)
}

/// Detect the markup generation of a capture.
pub fn detect_format(document: &Html) -> PageFormat {
    if document.select(&CURRENT_MARKER).next().is_some() {
        PageFormat::Current
    } else if document.select(&A_ROOT).next().is_some() {
        PageFormat::LegacyA
    } else if document.select(&B_ROOT).next().is_some() {
        PageFormat::LegacyB
    } else if !LayerValues::from_document(document).is_empty() {
        PageFormat::InlineScript
    } else {
        PageFormat::Unrecognized
    }
}

/// Extract a fact from an archived capture of `page_url`.
///
/// `capture_year` stands in for the guide year when a recognized page names a
/// distinction but no year. Unrecognized pages never carry an award.
pub fn extract_snapshot(
    html: &str,
    page_url: &str,
    capture_year: i32,
    policy: UnknownDistinctionPolicy,
) -> SnapshotExtraction {
    let document = Html::parse_document(html);
    let format = detect_format(&document);
    let layer = LayerValues::from_document(&document);

    let mut fact = match format {
        PageFormat::Current => extract_detail(html, &DetailRequest::new(page_url), policy),
        PageFormat::LegacyA => extract_legacy_a(&document, page_url, policy),
        PageFormat::LegacyB => extract_legacy_b(&document, page_url, policy),
        PageFormat::InlineScript => RestaurantFact::new(page_url),
        PageFormat::Unrecognized => {
            let mut fact = RestaurantFact::new(page_url);
            fact.name = first_text(&document, &HEADING);
            fact
        }
    };

    if format != PageFormat::Unrecognized {
        fill_from_layer(&mut fact, &layer, policy);
        if fact.year <= 0 {
            fact.year = guide_year(&document);
        }
        if fact.year <= 0 && fact.distinction.is_some() {
            fact.year = capture_year;
        }
    } else {
        fact.distinction = None;
        fact.year = 0;
    }

    if fact.image_url.is_none() {
        let image = first_attr(&document, &OG_IMAGE, "content");
        fact.image_url = (!image.is_empty()).then_some(image);
    }

    SnapshotExtraction { format, fact }
}

fn extract_legacy_a(
    document: &Html,
    page_url: &str,
    policy: UnknownDistinctionPolicy,
) -> RestaurantFact {
    let mut fact = RestaurantFact::new(page_url);
    fact.name = first_text(document, &A_TITLE);

    let details = all_texts(document, &A_DETAILS);
    if let Some(address) = details.first() {
        fact.address = address.clone();
    }
    if let Some(location) = details.get(1) {
        fact.location = location.clone();
    }

    let (price, cuisine) = split_unpack(&first_text(document, &A_PRICE), "·");
    fact.price = map_price(&price);
    fact.cuisine = cuisine;

    let classifications = all_texts(document, &A_CLASSIFICATION);
    fact.green_star = classifications.iter().any(|c| parse_green_star(c));
    fact.distinction = classifications
        .iter()
        .find(|c| !parse_green_star(c))
        .and_then(|c| policy.resolve(c));

    fact.description = first_text(document, &A_DESCRIPTION);
    fact.facilities_and_services = all_texts(document, &A_SERVICES).join(",");
    fact.phone_number = parse_phone_number(&first_attr(document, &A_PHONE, "href"));
    fact
}

/// Distinction encoded in class names such as `distinction-2-stars`.
fn distinction_from_classes(document: &Html) -> Option<Distinction> {
    document
        .select(&B_DISTINCTION_PARTS)
        .flat_map(|e| e.value().classes())
        .find_map(|class| classify_distinction(&class.replace(['-', '_'], " ")))
}

fn extract_legacy_b(
    document: &Html,
    page_url: &str,
    policy: UnknownDistinctionPolicy,
) -> RestaurantFact {
    let mut fact = RestaurantFact::new(page_url);
    fact.name = first_text(document, &B_ROOT);
    fact.address = first_text(document, &B_ADDRESS);
    fact.cuisine = first_text(document, &B_CUISINE);
    fact.price = map_price(&first_text(document, &B_PRICE));
    fact.description = first_text(document, &B_DESCRIPTION);
    fact.phone_number = parse_phone_number(&first_text(document, &B_PHONE));

    let label = first_text(document, &B_DISTINCTION);
    fact.green_star = label.to_lowercase().contains("green star");
    fact.distinction = distinction_from_classes(document).or_else(|| {
        let label = label.to_lowercase().replace("michelin green star", "");
        if label.trim().is_empty() {
            None
        } else {
            policy.resolve(&label)
        }
    });
    fact
}

fn fill_from_layer(
    fact: &mut RestaurantFact,
    layer: &LayerValues,
    policy: UnknownDistinctionPolicy,
) {
    fn fill(target: &mut String, source: &str) {
        if target.is_empty() {
            *target = source.to_string();
        }
    }

    fill(&mut fact.name, &layer.name);
    fill(&mut fact.cuisine, &layer.cuisine);
    fill(&mut fact.location, &layer.city);
    if fact.price.is_empty() {
        fact.price = map_price(&layer.price);
    }
    if fact.distinction.is_none() && !layer.distinction.is_empty() {
        fact.distinction = policy.resolve(&layer.distinction);
    }
    if fact.year <= 0 {
        fact.year = parse_year(&layer.year);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FactOrigin;

    const URL: &str = "https://guide.michelin.com/fr/en/ile-de-france/paris/restaurant/alpha";
    const SELECTED: UnknownDistinctionPolicy = UnknownDistinctionPolicy::Selected;

    const LEGACY_A: &str = r#"
      <html><body>
        <div class="restaurant-details__heading">
          <h2 class="restaurant-details__heading--title">Alpha</h2>
          <ul class="restaurant-details__heading--list">
            <li>1 Rue A, 75001 Paris</li>
            <li>Paris</li>
          </ul>
          <div class="restaurant-details__heading-price">CAT_P03 · Creative</div>
        </div>
        <div class="restaurant-details__classification">
          <ul class="restaurant-details__classification--list">
            <li>Two MICHELIN Stars: Excellent cooking</li>
            <li>MICHELIN Green Star</li>
          </ul>
          <p>MICHELIN Guide France 2019</p>
        </div>
        <div class="restaurant-details__description--text">Bold plates.</div>
        <a href="tel:+33 1 42 60 00 00">Call</a>
      </body></html>
    "#;

    const LEGACY_B: &str = r#"
      <html><body>
        <h1 class="poi_intro-display-title">Beta</h1>
        <div class="poi_intro-display-address">2 Main Street, London</div>
        <div class="poi_intro-display-cuisines">Modern British</div>
        <div class="poi_intro-display-michelin-distinction">
          <span class="distinction-icon distinction_1-star"></span>
        </div>
      </body></html>
    "#;

    const INLINE: &str = r#"
      <html><head><script>
        var dLayer = dLayer || {};
        dLayer['restaurant_name'] = 'Gamma';
        dLayer['distinction'] = 'bib gourmand';
        dLayer['price'] = 'CAT_P02';
        dLayer['city'] = 'Lyon';
      </script></head><body><div>no structure</div></body></html>
    "#;

    #[test]
    fn test_detect_formats() {
        assert_eq!(detect_format(&Html::parse_document(LEGACY_A)), PageFormat::LegacyA);
        assert_eq!(detect_format(&Html::parse_document(LEGACY_B)), PageFormat::LegacyB);
        assert_eq!(detect_format(&Html::parse_document(INLINE)), PageFormat::InlineScript);
        assert_eq!(
            detect_format(&Html::parse_document(
                r#"<h1 class="data-sheet__title">Delta</h1>"#
            )),
            PageFormat::Current
        );
        assert_eq!(
            detect_format(&Html::parse_document("<html><body>gone</body></html>")),
            PageFormat::Unrecognized
        );
    }

    #[test]
    fn test_legacy_a() {
        let result = extract_snapshot(LEGACY_A, URL, 2020, SELECTED);
        let fact = result.fact;
        assert_eq!(fact.name, "Alpha");
        assert_eq!(fact.address, "1 Rue A, 75001 Paris");
        assert_eq!(fact.price, "$$$");
        assert_eq!(fact.cuisine, "Creative");
        assert_eq!(fact.distinction, Some(Distinction::TwoStars));
        assert!(fact.green_star);
        assert_eq!(fact.phone_number, "+33142600000");
        // Year printed on the page wins over the capture year.
        assert_eq!(fact.year, 2019);
    }

    #[test]
    fn test_legacy_b_uses_class_tokens_and_capture_year() {
        let result = extract_snapshot(LEGACY_B, URL, 2017, SELECTED);
        assert_eq!(result.format, PageFormat::LegacyB);
        assert_eq!(result.fact.name, "Beta");
        assert_eq!(result.fact.cuisine, "Modern British");
        assert_eq!(result.fact.distinction, Some(Distinction::OneStar));
        assert_eq!(result.fact.year, 2017);
    }

    #[test]
    fn test_inline_script() {
        let result = extract_snapshot(INLINE, URL, 2016, SELECTED);
        assert_eq!(result.format, PageFormat::InlineScript);
        assert_eq!(result.fact.name, "Gamma");
        assert_eq!(result.fact.distinction, Some(Distinction::BibGourmand));
        assert_eq!(result.fact.price, "$$");
        assert_eq!(result.fact.location, "Lyon");
        assert_eq!(result.fact.year, 2016);
    }

    #[test]
    fn test_object_literal_layer_is_not_found() {
        let html = r#"<html><head><script>
            dLayer = { 'distinction': '1 star', 'restaurant_name': 'Eps' };
        </script></head><body></body></html>"#;
        let result = extract_snapshot(html, URL, 2016, SELECTED);
        assert_eq!(result.format, PageFormat::Unrecognized);
        assert_eq!(result.fact.distinction, None);
        assert_eq!(result.fact.year, 0);
    }

    #[test]
    fn test_unrecognized_keeps_partial_fields() {
        let html = r#"<html><head><meta property="og:image" content="https://img.example/z.jpg"></head>
            <body><h1>Zeta</h1><p>Two stars</p></body></html>"#;
        let result = extract_snapshot(html, URL, 2015, SELECTED);
        assert_eq!(result.format, PageFormat::Unrecognized);
        assert_eq!(result.fact.name, "Zeta");
        assert_eq!(result.fact.image_url.as_deref(), Some("https://img.example/z.jpg"));
        assert!(result.fact.award_fact(&FactOrigin::LiveCrawl).is_none());
    }

    #[test]
    fn test_current_format_in_archive() {
        let html = r#"<html><body>
            <h1 class="data-sheet__title">Eta</h1>
            <div class="data-sheet__classification-item--content">One Star: High quality cooking</div>
        </body></html>"#;
        let result = extract_snapshot(html, URL, 2022, SELECTED);
        assert_eq!(result.format, PageFormat::Current);
        assert_eq!(result.fact.url, URL);
        assert_eq!(result.fact.distinction, Some(Distinction::OneStar));
        assert_eq!(result.fact.year, 2022);
    }
}
