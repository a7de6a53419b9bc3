//! Live crawl: listing walk feeding a detail worker pool.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::detail::extract_detail;
use super::http_client::{FetchError, Fetcher, PRIMARY_BASE_URL};
use super::listing::{DetailRequest, ListingWalker};
use super::session::{CrawlSession, CrawlStats};
use crate::models::{Distinction, FactOrigin};
use crate::parser::UnknownDistinctionPolicy;
use crate::repository::{ApplyOptions, DieselFactStore};

/// Listing URL for a distinction.
pub fn start_url(distinction: Distinction) -> String {
    format!("{}{}", PRIMARY_BASE_URL, distinction.listing_path())
}

/// Crawls the live guide and applies every detail page to the store.
#[derive(Clone)]
pub struct LiveCrawler {
    fetcher: Fetcher,
    store: DieselFactStore,
    policy: UnknownDistinctionPolicy,
}

impl LiveCrawler {
    pub fn new(fetcher: Fetcher, store: DieselFactStore, policy: UnknownDistinctionPolicy) -> Self {
        Self {
            fetcher,
            store,
            policy,
        }
    }

    /// Walk every distinction listing in tier order.
    pub async fn run(&self, session: Arc<CrawlSession>) -> CrawlStats {
        let span = info_span!("crawl", session = %session.id());
        async {
            let (tx, rx) = mpsc::channel(self.queue_capacity());
            let workers = self.spawn_workers(rx, session.clone());

            let walker = ListingWalker::new(&self.fetcher, &session);
            for distinction in Distinction::ALL {
                if session.is_cancelled() || session.limit_reached().await {
                    break;
                }
                info!(distinction = %distinction, "Walking listing");
                walker.walk(&start_url(distinction), distinction, &tx).await;
            }
            drop(tx);

            join_workers(workers).await;
            session.stats().await
        }
        .instrument(span)
        .await
    }

    /// Fetch a fixed list of detail requests, e.g. from a seed file.
    pub async fn run_requests(
        &self,
        requests: Vec<DetailRequest>,
        session: Arc<CrawlSession>,
    ) -> CrawlStats {
        let span = info_span!("crawl", session = %session.id());
        async {
            let (tx, rx) = mpsc::channel(self.queue_capacity());
            let workers = self.spawn_workers(rx, session.clone());

            for request in requests {
                if session.is_cancelled() || !session.try_queue_detail().await {
                    break;
                }
                session.update(|s| s.discovered += 1).await;
                if tx.send(request).await.is_err() {
                    break;
                }
            }
            drop(tx);

            join_workers(workers).await;
            session.stats().await
        }
        .instrument(span)
        .await
    }

    fn queue_capacity(&self) -> usize {
        self.fetcher.config().workers.max(1) * 4
    }

    fn spawn_workers(
        &self,
        rx: mpsc::Receiver<DetailRequest>,
        session: Arc<CrawlSession>,
    ) -> Vec<JoinHandle<()>> {
        let count = self.fetcher.config().workers.max(1);
        let rx = Arc::new(Mutex::new(rx));
        let mut handles = Vec::with_capacity(count);

        for worker in 0..count {
            let rx = rx.clone();
            let crawler = self.clone();
            let session = session.clone();

            let handle = tokio::spawn(
                async move {
                    loop {
                        let request = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        let Some(request) = request else {
                            break;
                        };
                        if session.is_cancelled() {
                            break;
                        }
                        crawler.process(request, &session).await;
                    }
                    debug!(worker, "Detail worker finished");
                }
                .in_current_span(),
            );
            handles.push(handle);
        }

        handles
    }

    /// Fetch, extract and persist one detail page.
    pub async fn process(&self, request: DetailRequest, session: &CrawlSession) {
        let page = match self.fetcher.fetch(&request.url, session).await {
            Ok(page) => page,
            Err(e) if e.is_skip() => {
                debug!(url = %request.url, "Skipped: {}", e);
                session.update(|s| s.skipped += 1).await;
                return;
            }
            Err(FetchError::Cancelled) => return,
            Err(e) => {
                warn!(url = %request.url, "Detail fetch failed: {}", e);
                session.update(|s| s.errors += 1).await;
                return;
            }
        };

        let fact = extract_detail(&page.body, &request, self.policy);
        let missing = fact.missing_fields();
        if !missing.is_empty() {
            warn!(url = %fact.url, missing = ?missing, "Incomplete restaurant data");
            session.update(|s| s.incomplete += 1).await;
        }
        if fact.year <= 0 {
            warn!(url = %fact.url, "No published year found; award will not be saved");
        }

        match self
            .store
            .apply_fact(&fact, &FactOrigin::LiveCrawl, ApplyOptions::live_crawl())
            .await
        {
            Ok(outcome) => {
                session.record_outcome(&outcome).await;
                info!(
                    url = %fact.url,
                    name = %fact.name,
                    year = fact.year,
                    distinction = ?fact.distinction,
                    restaurant = ?outcome.restaurant,
                    award = ?outcome.award,
                    "Applied restaurant"
                );
            }
            Err(e) => {
                error!(url = %fact.url, "Failed to save restaurant: {}", e);
                session.update(|s| s.errors += 1).await;
            }
        }
    }
}

async fn join_workers(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        if let Err(e) = worker.await {
            error!("Worker task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{migrations::run_migrations, SqlitePool};
    use crate::scrapers::http_client::{FetchConfig, ResponseCache};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const DETAIL: &str = r#"
      <html><head><script type="application/ld+json">
        {"@type":"Restaurant","name":"Alpha","address":"1 Rue A, Paris",
         "review":{"datePublished":"2025-03-01"}}
      </script></head><body>
        <h1 class="data-sheet__title">Alpha</h1>
        <div class="data-sheet__description">Fine.</div>
      </body></html>
    "#;

    #[test]
    fn test_start_urls() {
        assert_eq!(
            start_url(Distinction::OneStar),
            "https://guide.michelin.com/en/restaurants/1-star-michelin"
        );
    }

    #[tokio::test]
    async fn test_run_requests_persists_cached_pages() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("t.db").display());
        run_migrations(&url).await.unwrap();
        let store = DieselFactStore::new(SqlitePool::new(&url));

        let cache_dir = dir.path().join("cache");
        let page_url = "https://guide.michelin.com/en/paris/restaurant/alpha";
        ResponseCache::new(&cache_dir).put(page_url, DETAIL).await.unwrap();
        let fetcher = Fetcher::new(
            FetchConfig::primary_site(),
            None,
            Duration::from_secs(5),
            Some(cache_dir),
        )
        .unwrap();

        let crawler = LiveCrawler::new(fetcher, store.clone(), UnknownDistinctionPolicy::Selected);
        let mut request = DetailRequest::new(page_url);
        request.distinction = Some(Distinction::OneStar);
        request.latitude = "48.8".to_string();
        request.longitude = "2.3".to_string();

        let session = Arc::new(CrawlSession::new(0, None, CancellationToken::new()));
        let stats = crawler
            .run_requests(vec![request.clone(), request], session)
            .await;

        assert_eq!(stats.restaurants_created, 1);
        assert_eq!(stats.awards_created, 1);
        assert_eq!(stats.skipped, 1);

        let restaurant = store.find_by_url(page_url).await.unwrap().unwrap();
        assert!(restaurant.in_guide);
        let awards = store.awards_for(restaurant.id).await.unwrap();
        assert_eq!(awards[0].year, 2025);
        assert_eq!(awards[0].distinction, Distinction::OneStar);
    }

    #[tokio::test]
    async fn test_process_without_year_saves_no_award() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("t.db").display());
        run_migrations(&url).await.unwrap();
        let store = DieselFactStore::new(SqlitePool::new(&url));

        let cache_dir = dir.path().join("cache");
        let page_url = "https://guide.michelin.com/en/x/restaurant/noyear";
        ResponseCache::new(&cache_dir)
            .put(page_url, r#"<h1 class="data-sheet__title">No Year</h1>"#)
            .await
            .unwrap();
        let fetcher = Fetcher::new(
            FetchConfig::primary_site(),
            None,
            Duration::from_secs(5),
            Some(cache_dir),
        )
        .unwrap();
        let crawler = LiveCrawler::new(fetcher, store.clone(), UnknownDistinctionPolicy::Selected);

        let session = CrawlSession::new(0, None, CancellationToken::new());
        let mut request = DetailRequest::new(page_url);
        request.distinction = Some(Distinction::BibGourmand);
        crawler.process(request, &session).await;

        let stats = session.stats().await;
        assert_eq!(stats.restaurants_created, 1);
        assert_eq!(stats.awards_rejected, 1);
        assert_eq!(stats.incomplete, 1);
        assert_eq!(store.counts().await.unwrap().awards, 0);
    }
}
