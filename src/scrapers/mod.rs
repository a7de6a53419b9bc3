//! Live guide crawling: fetcher, listing walker, detail extractor and the
//! worker pool tying them to the fact store.

pub mod csv_seed;
pub mod detail;
pub mod http_client;
pub mod listing;
pub mod live;
pub mod rate_limiter;
pub mod session;

pub use detail::extract_detail;
pub use http_client::{
    backoff_delay, BackoffKind, FetchConfig, FetchError, FetchedPage, Fetcher, ResponseCache,
};
pub use listing::{parse_listing_page, DetailRequest, ListingItem, ListingPage, ListingWalker};
pub use live::LiveCrawler;
pub use rate_limiter::RateLimiter;
pub use session::{CrawlSession, CrawlStats};
