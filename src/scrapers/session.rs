//! Crawl session: shared counters, visited set and cancellation for one run.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use super::http_client::FetchError;
use crate::repository::{ApplyOutcome, AwardOutcome, RecordChange};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Detail URLs found on listing pages or in the archive index.
    pub discovered: usize,
    /// Detail requests handed to workers.
    pub queued: usize,
    /// Pages returned from the network.
    pub fetched: usize,
    pub cache_hits: usize,
    pub retries: usize,
    /// URLs given up on after the retry ceiling.
    pub abandoned: usize,
    pub skipped: usize,
    /// Facts missing required fields.
    pub incomplete: usize,
    pub errors: usize,
    pub restaurants_created: usize,
    pub restaurants_updated: usize,
    pub restaurants_unchanged: usize,
    pub awards_created: usize,
    pub awards_updated: usize,
    pub awards_unchanged: usize,
    pub awards_rejected: usize,
    /// Facts without a distinction.
    pub awards_skipped: usize,
}

impl CrawlStats {
    pub fn record_outcome(&mut self, outcome: &ApplyOutcome) {
        match outcome.restaurant {
            RecordChange::Created => self.restaurants_created += 1,
            RecordChange::Updated => self.restaurants_updated += 1,
            RecordChange::Unchanged => self.restaurants_unchanged += 1,
        }
        match outcome.award {
            AwardOutcome::Created => self.awards_created += 1,
            AwardOutcome::Updated => self.awards_updated += 1,
            AwardOutcome::Unchanged => self.awards_unchanged += 1,
            AwardOutcome::Rejected(_) => self.awards_rejected += 1,
            AwardOutcome::Skipped => self.awards_skipped += 1,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    visited: HashSet<String>,
    attempts: HashMap<String, u32>,
    requests: usize,
    stats: CrawlStats,
}

/// State shared by every worker of one crawl run.
///
/// All mutable counters sit behind a single mutex. Critical sections never
/// await, so the lock is only held for bookkeeping.
#[derive(Debug)]
pub struct CrawlSession {
    id: Uuid,
    max_urls: usize,
    detail_limit: Option<usize>,
    cancel: CancellationToken,
    state: Mutex<SessionState>,
}

impl CrawlSession {
    pub fn new(max_urls: usize, detail_limit: Option<usize>, cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            max_urls,
            detail_limit,
            cancel,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Mark a URL as visited. Returns false if it already was.
    pub async fn mark_visited(&self, url: &str) -> bool {
        self.state.lock().await.visited.insert(url.to_string())
    }

    /// Increment and return the attempt counter for a URL.
    pub async fn record_attempt(&self, url: &str) -> u32 {
        let mut state = self.state.lock().await;
        let attempt = state.attempts.entry(url.to_string()).or_insert(0);
        *attempt += 1;
        let attempt = *attempt;
        if attempt > 1 {
            state.stats.retries += 1;
        }
        attempt
    }

    /// Take one network request from the run budget.
    pub async fn reserve_request(&self) -> Result<(), FetchError> {
        let mut state = self.state.lock().await;
        if state.requests >= self.max_urls {
            return Err(FetchError::BudgetExhausted);
        }
        state.requests += 1;
        Ok(())
    }

    pub async fn requests_made(&self) -> usize {
        self.state.lock().await.requests
    }

    /// Count a detail request as queued if the run limit allows it.
    pub async fn try_queue_detail(&self) -> bool {
        let mut state = self.state.lock().await;
        if let Some(limit) = self.detail_limit {
            if state.stats.queued >= limit {
                return false;
            }
        }
        state.stats.queued += 1;
        true
    }

    /// Whether the detail limit has been reached.
    pub async fn limit_reached(&self) -> bool {
        match self.detail_limit {
            Some(limit) => self.state.lock().await.stats.queued >= limit,
            None => false,
        }
    }

    /// Update counters under the session lock.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut CrawlStats),
    {
        f(&mut self.state.lock().await.stats);
    }

    pub async fn record_outcome(&self, outcome: &ApplyOutcome) {
        self.state.lock().await.stats.record_outcome(outcome);
    }

    /// Snapshot of the counters.
    pub async fn stats(&self) -> CrawlStats {
        self.state.lock().await.stats.clone()
    }
}
