//! Award merge policy.
//!
//! Decides, for a single `(restaurant, year)` slot, whether an incoming award
//! fact may be written. The policy is pure; the fact store applies the
//! decision inside its transaction.
//!
//! | stored      | incoming  | result      |
//! |-------------|-----------|-------------|
//! | none        | any       | `Create`    |
//! | scrape      | scrape    | `Overwrite` |
//! | backfill    | scrape    | `Overwrite` |
//! | backfill    | backfill  | `Overwrite` |
//! | scrape      | backfill  | `Reject`    |
//!
//! An incoming fact identical to the stored value is `Unchanged`, and a
//! non-positive year is always rejected. A backfill fact that differs only in
//! its snapshot reference counts as a change, so the slot follows the latest
//! snapshot processed.

use crate::models::{Award, AwardFact, Provenance};

/// Why an incoming award fact was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The fact carried no usable guide year.
    InvalidYear(i32),
    /// A backfill value tried to replace a live-scraped one.
    ScrapeProtected,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidYear(year) => write!(f, "invalid award year {}", year),
            Self::ScrapeProtected => f.write_str("slot already holds a live-scraped award"),
        }
    }
}

/// Outcome of evaluating one award slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Create,
    Overwrite,
    Unchanged,
    Reject(RejectReason),
}

impl MergeDecision {
    /// Whether the decision results in a write.
    pub fn writes(&self) -> bool {
        matches!(self, Self::Create | Self::Overwrite)
    }
}

/// The provenance-aware slot policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergePolicy;

impl MergePolicy {
    pub fn decide(existing: Option<&Award>, incoming: &AwardFact) -> MergeDecision {
        if incoming.year <= 0 {
            return MergeDecision::Reject(RejectReason::InvalidYear(incoming.year));
        }

        let Some(existing) = existing else {
            return MergeDecision::Create;
        };

        if incoming.matches(existing) {
            return MergeDecision::Unchanged;
        }

        match (existing.provenance, incoming.provenance) {
            (Provenance::Scrape, Provenance::Backfill) => {
                MergeDecision::Reject(RejectReason::ScrapeProtected)
            }
            _ => MergeDecision::Overwrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Distinction;
    use chrono::Utc;

    fn stored(provenance: Provenance, distinction: Distinction) -> Award {
        Award {
            id: 1,
            restaurant_id: 7,
            year: 2023,
            distinction,
            price: "$$$".to_string(),
            green_star: false,
            provenance,
            wayback_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn incoming(provenance: Provenance, distinction: Distinction) -> AwardFact {
        AwardFact {
            year: 2023,
            distinction,
            price: "$$$".to_string(),
            green_star: false,
            provenance,
            wayback_url: None,
        }
    }

    #[test]
    fn test_empty_slot_is_created() {
        let fact = incoming(Provenance::Backfill, Distinction::OneStar);
        assert_eq!(MergePolicy::decide(None, &fact), MergeDecision::Create);
    }

    #[test]
    fn test_backfill_cannot_replace_scrape() {
        let existing = stored(Provenance::Scrape, Distinction::TwoStars);
        let fact = incoming(Provenance::Backfill, Distinction::OneStar);
        assert_eq!(
            MergePolicy::decide(Some(&existing), &fact),
            MergeDecision::Reject(RejectReason::ScrapeProtected)
        );
    }

    #[test]
    fn test_scrape_upgrades_backfill() {
        let existing = stored(Provenance::Backfill, Distinction::OneStar);
        let fact = incoming(Provenance::Scrape, Distinction::OneStar);
        assert_eq!(
            MergePolicy::decide(Some(&existing), &fact),
            MergeDecision::Overwrite
        );
    }

    #[test]
    fn test_same_provenance_overwrites() {
        let existing = stored(Provenance::Scrape, Distinction::OneStar);
        let fact = incoming(Provenance::Scrape, Distinction::TwoStars);
        assert_eq!(
            MergePolicy::decide(Some(&existing), &fact),
            MergeDecision::Overwrite
        );

        let existing = stored(Provenance::Backfill, Distinction::OneStar);
        let fact = incoming(Provenance::Backfill, Distinction::BibGourmand);
        assert_eq!(
            MergePolicy::decide(Some(&existing), &fact),
            MergeDecision::Overwrite
        );
    }

    #[test]
    fn test_identical_fact_is_unchanged() {
        let existing = stored(Provenance::Scrape, Distinction::OneStar);
        let fact = incoming(Provenance::Scrape, Distinction::OneStar);
        let decision = MergePolicy::decide(Some(&existing), &fact);
        assert_eq!(decision, MergeDecision::Unchanged);
        assert!(!decision.writes());
    }

    #[test]
    fn test_newer_snapshot_refreshes_backfill_reference() {
        let mut existing = stored(Provenance::Backfill, Distinction::OneStar);
        existing.wayback_url = Some("https://web.archive.org/web/2019/a".to_string());

        let mut fact = incoming(Provenance::Backfill, Distinction::OneStar);
        fact.wayback_url = existing.wayback_url.clone();
        assert_eq!(
            MergePolicy::decide(Some(&existing), &fact),
            MergeDecision::Unchanged
        );

        fact.wayback_url = Some("https://web.archive.org/web/2019/b".to_string());
        assert_eq!(
            MergePolicy::decide(Some(&existing), &fact),
            MergeDecision::Overwrite
        );

        let scraped = stored(Provenance::Scrape, Distinction::OneStar);
        assert_eq!(
            MergePolicy::decide(Some(&scraped), &fact),
            MergeDecision::Reject(RejectReason::ScrapeProtected)
        );
    }

    #[test]
    fn test_non_positive_year_is_rejected() {
        let mut fact = incoming(Provenance::Scrape, Distinction::OneStar);
        fact.year = 0;
        assert_eq!(
            MergePolicy::decide(None, &fact),
            MergeDecision::Reject(RejectReason::InvalidYear(0))
        );
    }
}
