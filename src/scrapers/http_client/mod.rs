//! Polite HTTP fetcher with caching, retry and per-run budgets.

mod cache;
mod config;
mod error;
mod response;
mod user_agent;

pub use cache::ResponseCache;
pub use config::{FetchConfig, ARCHIVE_HOST, PRIMARY_BASE_URL, PRIMARY_HOST};
pub use error::{backoff_delay, BackoffKind, FetchError};
pub use response::FetchedPage;
pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::rate_limiter::{RateLimitConfig, RateLimiter};
use super::session::CrawlSession;

/// Headers a desktop browser sends on a top-level navigation.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers
}

/// HTTP fetcher bound to one politeness profile.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: RateLimiter,
    cache: Option<ResponseCache>,
}

impl Fetcher {
    /// Create a fetcher.
    /// - `user_agent`: None for the crawler UA, "impersonate" for a browser UA
    /// - `cache_dir`: enables the response cache
    pub fn new(
        config: FetchConfig,
        user_agent: Option<&str>,
        timeout: Duration,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(user_agent))
            .default_headers(browser_headers())
            .cookie_store(true)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        if let Some(dir) = &cache_dir {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            rate_limiter: RateLimiter::with_config(RateLimitConfig::with_base_delay(config.delay)),
            client,
            config,
            cache: cache_dir.map(ResponseCache::new),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch a page, serving it from the cache when possible.
    pub async fn fetch(&self, url: &str, session: &CrawlSession) -> Result<FetchedPage, FetchError> {
        self.fetch_with(url, session, true).await
    }

    /// Fetch a page from the network, bypassing the cache entirely.
    pub async fn fetch_uncached(
        &self,
        url: &str,
        session: &CrawlSession,
    ) -> Result<FetchedPage, FetchError> {
        self.fetch_with(url, session, false).await
    }

    async fn fetch_with(
        &self,
        url: &str,
        session: &CrawlSession,
        use_cache: bool,
    ) -> Result<FetchedPage, FetchError> {
        if session.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if !self.config.allows(url) {
            return Err(FetchError::DomainNotAllowed(url.to_string()));
        }
        if !session.mark_visited(url).await {
            return Err(FetchError::AlreadyVisited(url.to_string()));
        }

        let cache = self.cache.as_ref().filter(|_| use_cache);

        if let Some(cache) = cache {
            match cache.get(url).await {
                Ok(Some(body)) => {
                    debug!(url = %url, "Cache hit");
                    session.update(|s| s.cache_hits += 1).await;
                    return Ok(FetchedPage {
                        url: url.to_string(),
                        status: 200,
                        body,
                        from_cache: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(url = %url, "Cache read failed: {}", e),
            }
        }

        loop {
            let attempt = session.record_attempt(url).await;
            session.reserve_request().await?;

            tokio::select! {
                _ = session.cancelled() => return Err(FetchError::Cancelled),
                _ = self.wait_turn(url) => {}
            }

            let err = match self.request(url).await {
                Ok(page) => {
                    session.update(|s| s.fetched += 1).await;
                    if let Some(cache) = cache {
                        if let Err(e) = cache.put(url, &page.body).await {
                            warn!(url = %url, "Cache write failed: {}", e);
                        }
                    }
                    return Ok(page);
                }
                Err(e) => e,
            };

            let Some(kind) = err.backoff_kind() else {
                return Err(err);
            };

            if attempt >= self.config.max_retry {
                warn!(url = %url, attempt, "Giving up: {}", err);
                session.update(|s| s.abandoned += 1).await;
                return Err(err);
            }

            if let Some(cache) = &self.cache {
                if let Err(e) = cache.remove(url).await {
                    debug!(url = %url, "Cache clear failed: {}", e);
                }
            }

            let base = match kind {
                BackoffKind::Blocked => self.config.blocked_backoff_base,
                BackoffKind::Generic => self.config.delay,
            };
            let wait = backoff_delay(kind, attempt, base);
            warn!(url = %url, attempt, "{}; retrying in {:?}", err, wait);

            tokio::select! {
                _ = session.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Per-domain spacing followed by random jitter.
    async fn wait_turn(&self, url: &str) {
        self.rate_limiter.acquire(url).await;

        let max_jitter = self.config.random_delay.as_millis() as u64;
        if max_jitter > 0 {
            let jitter = rand::rng().random_range(0..=max_jitter);
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }
    }

    /// One network attempt.
    async fn request(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let domain = RateLimiter::extract_domain(url);

        let mut request = self.client.get(url);
        if let Some(referer) = self.referer_for(url) {
            request = request.header(REFERER, referer);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                if let Some(ref domain) = domain {
                    self.rate_limiter.report_server_error(domain).await;
                }
                return Err(e.into());
            }
        };
        let status = response.status();
        let status_code = status.as_u16();

        if let Some(ref domain) = domain {
            if RateLimiter::is_blocking_status(status_code) {
                self.rate_limiter
                    .report_rate_limit(domain, status_code)
                    .await;
            } else if status.is_server_error() {
                self.rate_limiter.report_server_error(domain).await;
            } else if status.is_success() {
                self.rate_limiter.report_success(domain).await;
            }
        }

        if status.is_success() {
            let body = response.text().await?;
            debug!(url = %url, status = status_code, bytes = body.len(), "Fetched");
            Ok(FetchedPage {
                url: url.to_string(),
                status: status_code,
                body,
                from_cache: false,
            })
        } else if RateLimiter::is_blocking_status(status_code) {
            Err(FetchError::Blocked {
                url: url.to_string(),
                status: status_code,
            })
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: status_code,
            })
        }
    }

    /// Referer for non-root paths on the configured referer's host.
    fn referer_for(&self, url: &str) -> Option<&str> {
        referer_for(self.config.referer.as_deref()?, url)
    }
}

fn referer_for<'a>(referer: &'a str, url: &str) -> Option<&'a str> {
    let target = Url::parse(url).ok()?;
    let origin = Url::parse(referer).ok()?;
    if target.host_str() != origin.host_str() {
        return None;
    }
    match target.path() {
        "" | "/" => None,
        _ => Some(referer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn fetcher(config: FetchConfig, cache_dir: Option<PathBuf>) -> Fetcher {
        Fetcher::new(config, None, Duration::from_secs(5), cache_dir).unwrap()
    }

    #[test]
    fn test_referer_only_for_inner_paths() {
        let referer = "https://guide.michelin.com/";
        assert_eq!(referer_for(referer, "https://guide.michelin.com/"), None);
        assert_eq!(
            referer_for(referer, "https://guide.michelin.com/en/restaurants"),
            Some(referer)
        );
        assert_eq!(referer_for(referer, "https://web.archive.org/web/x"), None);
    }

    #[tokio::test]
    async fn test_rejects_foreign_domain() {
        let f = fetcher(FetchConfig::primary_site(), None);
        let session = CrawlSession::new(10, None, CancellationToken::new());
        let result = f.fetch("https://example.com/", &session).await;
        assert!(matches!(result, Err(FetchError::DomainNotAllowed(_))));
        assert_eq!(session.requests_made().await, 0);
    }

    #[tokio::test]
    async fn test_cache_hit_uses_no_budget() {
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(FetchConfig::primary_site(), Some(dir.path().to_path_buf()));
        let url = "https://guide.michelin.com/en/restaurants/3-stars-michelin";
        ResponseCache::new(dir.path())
            .put(url, "<html>cached</html>")
            .await
            .unwrap();

        let session = CrawlSession::new(0, None, CancellationToken::new());
        let page = f.fetch(url, &session).await.unwrap();
        assert!(page.from_cache);
        assert_eq!(page.body, "<html>cached</html>");
        assert_eq!(session.stats().await.cache_hits, 1);

        let again = f.fetch(url, &session).await;
        assert!(matches!(again, Err(FetchError::AlreadyVisited(_))));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_stops_network_fetch() {
        let f = fetcher(FetchConfig::primary_site(), None);
        let session = CrawlSession::new(0, None, CancellationToken::new());
        let result = f
            .fetch("https://guide.michelin.com/en/restaurants", &session)
            .await;
        assert!(matches!(result, Err(FetchError::BudgetExhausted)));
    }

    #[tokio::test]
    async fn test_cancelled_session_fetches_nothing() {
        let f = fetcher(FetchConfig::primary_site(), None);
        let token = CancellationToken::new();
        token.cancel();
        let session = CrawlSession::new(10, None, token);
        let result = f
            .fetch("https://guide.michelin.com/en/restaurants", &session)
            .await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
