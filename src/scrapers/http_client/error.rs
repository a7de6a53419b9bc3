//! Fetch errors and retry classification.

use std::time::Duration;

use thiserror::Error;

/// Why a fetch did not produce a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("blocked with HTTP {status} for {url}")]
    Blocked { url: String, status: u16 },

    #[error("domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("already visited: {0}")]
    AlreadyVisited(String),

    #[error("URL budget exhausted")]
    BudgetExhausted,

    #[error("cancelled")]
    Cancelled,

    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),
}

/// Retry class of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    /// 403, 429 or 503: quadratic backoff.
    Blocked,
    /// Any other transient failure: linear backoff.
    Generic,
}

impl FetchError {
    /// Retry class, or `None` when the error is terminal for this URL.
    pub fn backoff_kind(&self) -> Option<BackoffKind> {
        match self {
            Self::Blocked { .. } => Some(BackoffKind::Blocked),
            Self::Status { status, .. } if matches!(status, 404 | 410) => None,
            Self::Status { .. } | Self::Http(_) => Some(BackoffKind::Generic),
            _ => None,
        }
    }

    /// Whether the error only means the URL was skipped.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::AlreadyVisited(_) | Self::DomainNotAllowed(_))
    }
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(kind: BackoffKind, attempt: u32, base: Duration) -> Duration {
    match kind {
        BackoffKind::Blocked => base * attempt.saturating_mul(attempt),
        BackoffKind::Generic => base * attempt,
    }
}
