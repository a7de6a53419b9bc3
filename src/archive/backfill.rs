//! Backfill: replay archived captures of known restaurants into the award
//! timeline.
//!
//! Work is split per restaurant. Each worker discovers one restaurant's
//! captures and applies them in capture order, so a later capture of an
//! archival year overwrites an earlier one deterministically.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::discoverer::{ArchiveIndex, DiscoveryError, Snapshot};
use super::extract::{extract_snapshot, PageFormat};
use crate::models::FactOrigin;
use crate::parser::UnknownDistinctionPolicy;
use crate::repository::{ApplyOptions, DieselError, DieselFactStore};
use crate::scrapers::{CrawlSession, CrawlStats, FetchError, FetchedPage, Fetcher};

/// Source of archived page bodies.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str, session: &CrawlSession)
        -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch_page(
        &self,
        url: &str,
        session: &CrawlSession,
    ) -> Result<FetchedPage, FetchError> {
        self.fetch(url, session).await
    }
}

/// Replays archive captures through the merge policy.
#[derive(Clone)]
pub struct BackfillRunner {
    index: Arc<dyn ArchiveIndex>,
    pages: Arc<dyn PageSource>,
    store: DieselFactStore,
    policy: UnknownDistinctionPolicy,
    workers: usize,
    from_year: Option<i32>,
    to_year: Option<i32>,
}

impl BackfillRunner {
    pub fn new(
        index: Arc<dyn ArchiveIndex>,
        pages: Arc<dyn PageSource>,
        store: DieselFactStore,
        policy: UnknownDistinctionPolicy,
        workers: usize,
    ) -> Self {
        Self {
            index,
            pages,
            store,
            policy,
            workers: workers.max(1),
            from_year: None,
            to_year: None,
        }
    }

    /// Bound the capture years considered.
    pub fn with_years(mut self, from_year: Option<i32>, to_year: Option<i32>) -> Self {
        self.from_year = from_year;
        self.to_year = to_year;
        self
    }

    /// Restaurant URLs to backfill: `url` alone, or every stored guide URL.
    pub async fn targets(&self, url: Option<&str>) -> Result<Vec<String>, DieselError> {
        match url {
            Some(url) => Ok(vec![url.to_string()]),
            None => Ok(self
                .store
                .list_with_url()
                .await?
                .into_iter()
                .map(|r| r.url)
                .collect()),
        }
    }

    pub async fn run(&self, targets: Vec<String>, session: Arc<CrawlSession>) -> CrawlStats {
        let span = info_span!("backfill", session = %session.id());
        async {
            info!(restaurants = targets.len(), workers = self.workers, "Starting backfill");
            let (tx, rx) = mpsc::channel(self.workers * 4);
            let workers = self.spawn_workers(rx, session.clone());

            for url in targets {
                if session.is_cancelled() || session.limit_reached().await {
                    break;
                }
                if tx.send(url).await.is_err() {
                    break;
                }
            }
            drop(tx);

            for worker in workers {
                if let Err(e) = worker.await {
                    error!("Worker task failed: {}", e);
                }
            }
            session.stats().await
        }
        .instrument(span)
        .await
    }

    fn spawn_workers(
        &self,
        rx: mpsc::Receiver<String>,
        session: Arc<CrawlSession>,
    ) -> Vec<JoinHandle<()>> {
        let rx = Arc::new(Mutex::new(rx));
        (0..self.workers)
            .map(|worker| {
                let rx = rx.clone();
                let runner = self.clone();
                let session = session.clone();
                tokio::spawn(
                    async move {
                        loop {
                            let url = {
                                let mut rx = rx.lock().await;
                                rx.recv().await
                            };
                            let Some(url) = url else {
                                break;
                            };
                            if session.is_cancelled() {
                                break;
                            }
                            runner.backfill_restaurant(&url, &session).await;
                        }
                        debug!(worker, "Backfill worker finished");
                    }
                    .in_current_span(),
                )
            })
            .collect()
    }

    /// Discover and apply every usable capture of one restaurant page.
    pub async fn backfill_restaurant(&self, url: &str, session: &CrawlSession) {
        let snapshots = match self
            .index
            .snapshots(url, self.from_year, self.to_year, session)
            .await
        {
            Ok(snapshots) => snapshots,
            Err(DiscoveryError::Fetch(FetchError::Cancelled)) => return,
            Err(DiscoveryError::Fetch(FetchError::BudgetExhausted)) => {
                self.stop_on_budget(session);
                return;
            }
            Err(e) => {
                warn!(url = %url, "Snapshot discovery failed: {}", e);
                session.update(|s| s.errors += 1).await;
                return;
            }
        };

        session.update(|s| s.discovered += snapshots.len()).await;
        debug!(url = %url, snapshots = snapshots.len(), "Discovered snapshots");

        for snapshot in snapshots {
            if session.is_cancelled() || !session.try_queue_detail().await {
                break;
            }
            if !self.apply_snapshot(url, &snapshot, session).await {
                break;
            }
        }
    }

    /// Fetch, extract and apply one capture. Returns false when the run
    /// should stop.
    async fn apply_snapshot(
        &self,
        url: &str,
        snapshot: &Snapshot,
        session: &CrawlSession,
    ) -> bool {
        let archive_url = snapshot.archive_url();
        let page = match self.pages.fetch_page(&archive_url, session).await {
            Ok(page) => page,
            Err(FetchError::Cancelled) => return false,
            Err(FetchError::BudgetExhausted) => {
                self.stop_on_budget(session);
                return false;
            }
            Err(e) if e.is_skip() => {
                debug!(url = %archive_url, "Skipped: {}", e);
                session.update(|s| s.skipped += 1).await;
                return true;
            }
            Err(e) => {
                warn!(url = %archive_url, "Snapshot fetch failed: {}", e);
                session.update(|s| s.errors += 1).await;
                return true;
            }
        };

        let extraction = extract_snapshot(&page.body, url, snapshot.year(), self.policy);
        if extraction.format == PageFormat::Unrecognized {
            debug!(url = %archive_url, "Unrecognized snapshot format");
            session.update(|s| s.skipped += 1).await;
            return true;
        }
        let fact = extraction.fact;
        if !fact.missing_fields().is_empty() {
            session.update(|s| s.incomplete += 1).await;
        }

        let origin = FactOrigin::ArchiveSnapshot {
            snapshot_url: archive_url.clone(),
        };
        match self
            .store
            .apply_fact(&fact, &origin, ApplyOptions::backfill())
            .await
        {
            Ok(outcome) => {
                session.record_outcome(&outcome).await;
                debug!(
                    url = %url,
                    snapshot = %snapshot.timestamp,
                    format = extraction.format.as_str(),
                    year = fact.year,
                    distinction = ?fact.distinction,
                    award = ?outcome.award,
                    "Applied snapshot"
                );
            }
            Err(e) => {
                error!(
                    url = %url,
                    snapshot = %snapshot.timestamp,
                    "Failed to save snapshot: {}",
                    e
                );
                session.update(|s| s.errors += 1).await;
            }
        }
        true
    }

    fn stop_on_budget(&self, session: &CrawlSession) {
        if !session.is_cancelled() {
            warn!("URL budget exhausted, stopping backfill");
            session.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::cdx::parse_cdx_timestamp;
    use crate::models::{Distinction, Provenance, RestaurantFact};
    use crate::repository::{migrations::run_migrations, SqlitePool};
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    const URL: &str = "https://guide.michelin.com/en/paris/restaurant/x";

    struct FixedIndex(Vec<Snapshot>);

    #[async_trait]
    impl ArchiveIndex for FixedIndex {
        async fn snapshots(
            &self,
            _url: &str,
            _from_year: Option<i32>,
            _to_year: Option<i32>,
            _session: &CrawlSession,
        ) -> Result<Vec<Snapshot>, DiscoveryError> {
            Ok(self.0.clone())
        }
    }

    struct FixedPages(HashMap<String, String>);

    #[async_trait]
    impl PageSource for FixedPages {
        async fn fetch_page(
            &self,
            url: &str,
            _session: &CrawlSession,
        ) -> Result<FetchedPage, FetchError> {
            match self.0.get(url) {
                Some(body) => Ok(FetchedPage {
                    url: url.to_string(),
                    status: 200,
                    body: body.clone(),
                    from_cache: false,
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn snapshot(ts: &str, digest: &str) -> Snapshot {
        Snapshot {
            timestamp: ts.to_string(),
            original: URL.to_string(),
            digest: digest.to_string(),
            captured_at: parse_cdx_timestamp(ts).unwrap(),
        }
    }

    fn legacy_page(distinction: &str) -> String {
        format!(
            r#"<html><body>
              <div class="restaurant-details__heading">
                <h2 class="restaurant-details__heading--title">X</h2>
              </div>
              <ul class="restaurant-details__classification--list"><li>{}</li></ul>
            </body></html>"#,
            distinction
        )
    }

    async fn setup() -> (DieselFactStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("t.db").display());
        run_migrations(&url).await.unwrap();
        (DieselFactStore::new(SqlitePool::new(&url)), dir)
    }

    fn runner(
        store: &DieselFactStore,
        snapshots: Vec<Snapshot>,
        pages: Vec<(String, String)>,
    ) -> BackfillRunner {
        BackfillRunner::new(
            Arc::new(FixedIndex(snapshots)),
            Arc::new(FixedPages(pages.into_iter().collect())),
            store.clone(),
            UnknownDistinctionPolicy::Selected,
            2,
        )
    }

    #[tokio::test]
    async fn test_backfill_extends_timeline_without_downgrading() {
        let (store, _dir) = setup().await;
        let live = RestaurantFact {
            url: URL.to_string(),
            name: "X".to_string(),
            distinction: Some(Distinction::OneStar),
            year: 2024,
            ..Default::default()
        };
        store
            .apply_fact(&live, &FactOrigin::LiveCrawl, ApplyOptions::live_crawl())
            .await
            .unwrap();

        let old = snapshot("20190315000000", "AAA");
        let current = snapshot("20240601000000", "BBB");
        let pages = vec![
            (old.archive_url(), legacy_page("One MICHELIN Star")),
            (current.archive_url(), legacy_page("Bib Gourmand")),
        ];
        let runner = runner(&store, vec![old.clone(), current], pages);

        let targets = runner.targets(None).await.unwrap();
        assert_eq!(targets, vec![URL.to_string()]);
        let session = Arc::new(CrawlSession::new(100, None, CancellationToken::new()));
        let stats = runner.run(targets, session).await;

        assert_eq!(stats.discovered, 2);
        assert_eq!(stats.awards_created, 1);
        assert_eq!(stats.awards_rejected, 1);

        let restaurant = store.find_by_url(URL).await.unwrap().unwrap();
        assert!(restaurant.in_guide);
        let awards = store.awards_for(restaurant.id).await.unwrap();
        assert_eq!(awards.len(), 2);
        assert_eq!(awards[0].year, 2019);
        assert_eq!(awards[0].provenance, Provenance::Backfill);
        assert_eq!(awards[0].wayback_url.as_deref(), Some(old.archive_url().as_str()));
        assert_eq!(awards[1].year, 2024);
        assert_eq!(awards[1].distinction, Distinction::OneStar);
    }

    #[tokio::test]
    async fn test_single_url_creates_restaurant_outside_guide() {
        let (store, _dir) = setup().await;
        let first = snapshot("20170101000000", "AAA");
        let later = snapshot("20171101000000", "BBB");
        let missing = snapshot("20180101000000", "CCC");
        let pages = vec![
            (first.archive_url(), legacy_page("Bib Gourmand")),
            (later.archive_url(), legacy_page("Two MICHELIN Stars")),
        ];
        let runner = runner(&store, vec![first, later, missing], pages);

        let targets = runner.targets(Some(URL)).await.unwrap();
        let session = Arc::new(CrawlSession::new(100, None, CancellationToken::new()));
        let stats = runner.run(targets, session).await;
        assert_eq!(stats.restaurants_created, 1);
        assert_eq!(stats.awards_created, 1);
        assert_eq!(stats.awards_updated, 1);
        assert_eq!(stats.errors, 1);

        let restaurant = store.find_by_url(URL).await.unwrap().unwrap();
        assert!(!restaurant.in_guide);
        let awards = store.awards_for(restaurant.id).await.unwrap();
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].distinction, Distinction::TwoStars);
    }

    #[tokio::test]
    async fn test_unrecognized_snapshots_and_limit() {
        let (store, _dir) = setup().await;
        let blank = snapshot("20150101000000", "AAA");
        let good = snapshot("20160101000000", "BBB");
        let extra = snapshot("20170101000000", "CCC");
        let pages = vec![
            (blank.archive_url(), "<html><body>Moved</body></html>".to_string()),
            (good.archive_url(), legacy_page("Bib Gourmand")),
            (extra.archive_url(), legacy_page("One MICHELIN Star")),
        ];
        let runner = runner(&store, vec![blank, good, extra], pages);

        let session = Arc::new(CrawlSession::new(100, Some(2), CancellationToken::new()));
        let stats = runner.run(vec![URL.to_string()], session).await;
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.awards_created, 1);
        assert_eq!(store.counts().await.unwrap().backfill_awards, 1);
    }
}
