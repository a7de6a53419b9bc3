//! Politeness profiles for the fetcher.

use std::time::Duration;

use url::Url;

/// Host of the live guide.
pub const PRIMARY_HOST: &str = "guide.michelin.com";

/// Root URL of the live guide.
pub const PRIMARY_BASE_URL: &str = "https://guide.michelin.com";

/// Host of the web archive.
pub const ARCHIVE_HOST: &str = "web.archive.org";

/// Fetch behaviour for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Hosts that may be requested. Subdomains are allowed too.
    pub allowed_domains: Vec<String>,
    /// Fixed delay between requests; also the linear backoff base.
    pub delay: Duration,
    /// Upper bound of uniform jitter added before each request.
    pub random_delay: Duration,
    /// Attempts per URL before it is abandoned.
    pub max_retry: u32,
    /// Network requests allowed per run.
    pub max_urls: usize,
    /// Concurrent workers for this site.
    pub workers: usize,
    /// Base of the quadratic backoff applied when the site blocks us.
    pub blocked_backoff_base: Duration,
    /// Referer sent for non-root paths of this referer's host.
    pub referer: Option<String>,
}

impl FetchConfig {
    /// Single worker with slow, jittered spacing for the live guide.
    pub fn primary_site() -> Self {
        Self {
            allowed_domains: vec![PRIMARY_HOST.to_string()],
            delay: Duration::from_secs(4),
            random_delay: Duration::from_secs(4),
            max_retry: 3,
            max_urls: 30_000,
            workers: 1,
            blocked_backoff_base: Duration::from_secs(8),
            referer: Some(format!("{}/", PRIMARY_BASE_URL)),
        }
    }

    /// The primary profile with doubled spacing.
    pub fn conservative() -> Self {
        Self {
            delay: Duration::from_secs(8),
            random_delay: Duration::from_secs(8),
            ..Self::primary_site()
        }
    }

    pub fn archive() -> Self {
        Self {
            allowed_domains: vec![ARCHIVE_HOST.to_string()],
            delay: Duration::from_secs(1),
            random_delay: Duration::from_secs(1),
            max_retry: 3,
            max_urls: 100_000,
            workers: 4,
            blocked_backoff_base: Duration::from_secs(8),
            referer: None,
        }
    }

    /// Whether the URL's host is in the allowed set.
    pub fn allows(&self, url: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return false;
        };
        self.allowed_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}
