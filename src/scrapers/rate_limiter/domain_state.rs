//! Per-domain rate limiting state.

use std::time::{Duration, Instant};

/// State for a single domain.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Current delay for this domain.
    pub current_delay: Duration,
    /// Start time of the latest reserved request slot.
    pub last_request: Option<Instant>,
    /// Consecutive successes since last rate limit.
    pub consecutive_successes: u32,
    /// Whether currently in backoff.
    pub in_backoff: bool,
    /// Total requests made.
    pub total_requests: u64,
    /// Total rate limit hits.
    pub rate_limit_hits: u64,
}

impl DomainState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            last_request: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            rate_limit_hits: 0,
        }
    }

    /// Reserve the next request slot and return how long to wait for it.
    ///
    /// Slots are handed out `current_delay` apart, so concurrent callers
    /// queue behind each other instead of all firing once the domain is ready.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        let slot = match self.last_request {
            Some(last) => (last + self.current_delay).max(now),
            None => now,
        };
        self.last_request = Some(slot);
        self.total_requests += 1;
        slot - now
    }

    /// Time until this domain is ready for another request.
    pub fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => (last + self.current_delay).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_spaces_requests() {
        let mut state = DomainState::new(Duration::from_secs(2));
        let now = Instant::now();

        assert_eq!(state.reserve(now), Duration::ZERO);
        assert_eq!(state.reserve(now), Duration::from_secs(2));
        assert_eq!(state.reserve(now), Duration::from_secs(4));
        assert_eq!(state.total_requests, 3);
    }

    #[test]
    fn test_reserve_after_idle_is_immediate() {
        let mut state = DomainState::new(Duration::from_millis(10));
        let start = Instant::now();
        state.reserve(start);
        let later = start + Duration::from_secs(1);
        assert_eq!(state.reserve(later), Duration::ZERO);
    }
}
