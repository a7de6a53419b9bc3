//! Listing walker: pages through a distinction's listing and queues detail
//! requests.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::http_client::{FetchError, Fetcher};
use super::session::CrawlSession;
use crate::models::{Distinction, RestaurantFact};
use crate::parser::clean_text;

static CARD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.card__menu").unwrap());
static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.link").unwrap());
static CARD_LOCATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".card__menu-footer--score").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static NEXT_ARROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".fa-angle-right").unwrap());

/// Context carried from a listing card (or CSV row) to the detail fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRequest {
    pub url: String,
    /// Distinction of the listing the card was found on.
    pub distinction: Option<Distinction>,
    pub location: String,
    pub latitude: String,
    pub longitude: String,
    /// Values from a seed file, used where the page has none.
    pub seed: Option<RestaurantFact>,
}

impl DetailRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            distinction: None,
            location: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            seed: None,
        }
    }
}

/// One restaurant card on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub url: String,
    pub location: String,
    pub latitude: String,
    pub longitude: String,
}

/// Cards and pagination of one listing page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<ListingItem>,
    pub next_page: Option<String>,
}

fn attr(element: &ElementRef<'_>, name: &str) -> String {
    element.value().attr(name).unwrap_or("").trim().to_string()
}

fn text_of(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Parse a listing page. Relative links resolve against `page_url`.
pub fn parse_listing_page(html: &str, page_url: &Url) -> ListingPage {
    let document = Html::parse_document(html);

    let items = document
        .select(&CARD)
        .filter_map(|card| {
            let href = card.select(&CARD_LINK).next()?.value().attr("href")?;
            let url = page_url.join(href).ok()?;
            Some(ListingItem {
                url: url.to_string(),
                location: card
                    .select(&CARD_LOCATION)
                    .next()
                    .map(|e| text_of(&e))
                    .unwrap_or_default(),
                latitude: attr(&card, "data-lat"),
                longitude: attr(&card, "data-lng"),
            })
        })
        .collect();

    let next_page = document
        .select(&ANCHOR)
        .find(|a| a.select(&NEXT_ARROW).next().is_some())
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .map(|url| url.to_string())
        .filter(|url| url != page_url.as_str());

    ListingPage { items, next_page }
}

/// Walks the pages of one listing.
pub struct ListingWalker<'a> {
    fetcher: &'a Fetcher,
    session: &'a CrawlSession,
}

impl<'a> ListingWalker<'a> {
    pub fn new(fetcher: &'a Fetcher, session: &'a CrawlSession) -> Self {
        Self { fetcher, session }
    }

    /// Follow "next page" links from `start_url`, sending one request per card.
    ///
    /// Stops as soon as the session's detail limit is reached, even mid-page.
    /// Returns the number of requests sent.
    pub async fn walk(
        &self,
        start_url: &str,
        distinction: Distinction,
        tx: &mpsc::Sender<DetailRequest>,
    ) -> usize {
        let mut sent = 0;
        let mut page_url = start_url.to_string();
        let mut pages = 0;

        loop {
            if self.session.is_cancelled() || self.session.limit_reached().await {
                break;
            }

            let page = match self.fetcher.fetch(&page_url, self.session).await {
                Ok(page) => page,
                Err(e) if e.is_skip() => {
                    debug!(url = %page_url, "Listing page skipped: {}", e);
                    break;
                }
                Err(FetchError::Cancelled) | Err(FetchError::BudgetExhausted) => break,
                Err(e) => {
                    warn!(url = %page_url, "Listing page failed: {}", e);
                    self.session.update(|s| s.errors += 1).await;
                    break;
                }
            };
            pages += 1;

            let Ok(base) = Url::parse(&page_url) else {
                break;
            };
            let listing = parse_listing_page(&page.body, &base);
            debug!(
                url = %page_url,
                cards = listing.items.len(),
                "Parsed listing page"
            );

            for item in listing.items {
                if !self.session.try_queue_detail().await {
                    info!(distinction = %distinction, "Detail limit reached, stopping listing walk");
                    return sent;
                }
                self.session.update(|s| s.discovered += 1).await;

                let request = DetailRequest {
                    url: item.url,
                    distinction: Some(distinction),
                    location: item.location,
                    latitude: item.latitude,
                    longitude: item.longitude,
                    seed: None,
                };
                if tx.send(request).await.is_err() {
                    return sent;
                }
                sent += 1;
            }

            match listing.next_page {
                Some(next) => page_url = next,
                None => break,
            }
        }

        info!(distinction = %distinction, pages, sent, "Listing walk finished");
        sent
    }
}
