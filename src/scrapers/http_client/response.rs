//! Fetched page wrapper.

use scraper::Html;

/// A page body returned by the fetcher.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    /// Served from the on-disk cache without a network request.
    pub from_cache: bool,
}

impl FetchedPage {
    /// Parse the body as an HTML document.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}
