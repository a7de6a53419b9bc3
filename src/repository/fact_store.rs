//! Diesel-based fact store for restaurants and their yearly awards.
//!
//! Every fact is applied in one short transaction: restaurant upsert first,
//! then the award slot for the fact's year, decided by [`MergePolicy`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::pool::{DieselError, SqliteConn, SqlitePool};
use super::records::{
    AwardRecord, NewAward, NewRestaurant, RestaurantChangeset, RestaurantRecord,
};
use crate::merge::{MergeDecision, MergePolicy, RejectReason};
use crate::models::{
    Award, AwardFact, Distinction, FactOrigin, Restaurant, RestaurantFact, UNKNOWN_COORDINATE,
};
use crate::schema::{restaurant_awards, restaurants};

/// How a fact may touch the restaurant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// `in_guide` value for a restaurant created by this fact.
    pub in_guide_on_create: bool,
    /// Overwrite `in_guide` on an existing restaurant.
    pub force_in_guide: Option<bool>,
    /// Refresh descriptive fields of an existing restaurant.
    pub update_details: bool,
    /// Look the restaurant up by website URL before its guide URL.
    pub match_website: bool,
}

impl ApplyOptions {
    pub fn live_crawl() -> Self {
        Self {
            in_guide_on_create: true,
            force_in_guide: None,
            update_details: true,
            match_website: false,
        }
    }

    pub fn backfill() -> Self {
        Self {
            in_guide_on_create: false,
            force_in_guide: None,
            update_details: false,
            match_website: false,
        }
    }

    pub fn dataset(recent: bool) -> Self {
        Self {
            in_guide_on_create: recent,
            force_in_guide: recent.then_some(true),
            update_details: false,
            match_website: true,
        }
    }

    pub fn for_origin(origin: &FactOrigin) -> Self {
        match origin {
            FactOrigin::LiveCrawl => Self::live_crawl(),
            FactOrigin::ArchiveSnapshot { .. } => Self::backfill(),
            FactOrigin::Dataset { recent, .. } => Self::dataset(*recent),
        }
    }
}

/// What happened to the restaurant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChange {
    Created,
    Updated,
    Unchanged,
}

/// What happened to the award slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardOutcome {
    Created,
    Updated,
    Unchanged,
    Rejected(RejectReason),
    /// The fact carried no distinction.
    Skipped,
}

/// Result of applying one fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub restaurant_id: i32,
    pub restaurant: RecordChange,
    pub award: AwardOutcome,
}

/// Row counts for the status report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub restaurants: i64,
    pub in_guide: i64,
    pub awards: i64,
    pub scrape_awards: i64,
    pub backfill_awards: i64,
}

/// Diesel-based fact store.
///
/// Clones share one write lock, so concurrent workers queue for the single
/// SQLite writer instead of failing with `database is locked`.
#[derive(Clone)]
pub struct DieselFactStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl DieselFactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn find_by_url(&self, url: &str) -> Result<Option<Restaurant>, DieselError> {
        let mut conn = self.pool.get().await?;
        Ok(find_by_url(&mut conn, url).await?.map(Restaurant::from))
    }

    /// All restaurants that carry a guide URL, oldest first.
    pub async fn list_with_url(&self) -> Result<Vec<Restaurant>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = restaurants::table
            .filter(restaurants::url.ne(""))
            .order(restaurants::id.asc())
            .load::<RestaurantRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(Restaurant::from).collect())
    }

    /// Awards for a restaurant in year order.
    pub async fn awards_for(&self, restaurant_id: i32) -> Result<Vec<Award>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = restaurant_awards::table
            .filter(restaurant_awards::restaurant_id.eq(restaurant_id))
            .order(restaurant_awards::year.asc())
            .load::<AwardRecord>(&mut conn)
            .await?;
        Ok(records.into_iter().map(Award::from).collect())
    }

    pub async fn counts(&self) -> Result<StoreCounts, DieselError> {
        let mut conn = self.pool.get().await?;

        let total: i64 = restaurants::table.count().get_result(&mut conn).await?;
        let in_guide: i64 = restaurants::table
            .filter(restaurants::in_guide.eq(true))
            .count()
            .get_result(&mut conn)
            .await?;
        let by_provenance: Vec<(String, i64)> = restaurant_awards::table
            .group_by(restaurant_awards::provenance)
            .select((restaurant_awards::provenance, diesel::dsl::count_star()))
            .load(&mut conn)
            .await?;

        let mut counts = StoreCounts {
            restaurants: total,
            in_guide,
            ..Default::default()
        };
        for (provenance, count) in by_provenance {
            counts.awards += count;
            match provenance.as_str() {
                "scrape" => counts.scrape_awards += count,
                "backfill" => counts.backfill_awards += count,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// Award counts per distinction, in tier order. Tiers with no awards are
    /// reported as zero.
    pub async fn awards_by_distinction(&self) -> Result<Vec<(Distinction, i64)>, DieselError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<(String, i64)> = restaurant_awards::table
            .group_by(restaurant_awards::distinction)
            .select((restaurant_awards::distinction, diesel::dsl::count_star()))
            .load(&mut conn)
            .await?;

        Ok(Distinction::ALL
            .into_iter()
            .map(|d| {
                let count = rows
                    .iter()
                    .filter(|(label, _)| label == d.as_str())
                    .map(|(_, n)| *n)
                    .sum();
                (d, count)
            })
            .collect())
    }

    /// Clear `in_guide` on every in-guide restaurant whose website URL and
    /// guide URL are both absent from `keys`. Returns the number cleared.
    pub async fn clear_in_guide_except(&self, keys: &HashSet<String>) -> Result<usize, DieselError> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.get().await?;
        let listed: Vec<(i32, String, String)> = restaurants::table
            .filter(restaurants::in_guide.eq(true))
            .select((restaurants::id, restaurants::url, restaurants::website_url))
            .load(&mut conn)
            .await?;

        let stale: Vec<i32> = listed
            .into_iter()
            .filter(|(_, url, website)| {
                let website_known = !website.is_empty() && keys.contains(website);
                let url_known = !url.is_empty() && keys.contains(url);
                !website_known && !url_known
            })
            .map(|(id, _, _)| id)
            .collect();

        let now = Utc::now().to_rfc3339();
        let mut cleared = 0;
        for chunk in stale.chunks(500) {
            cleared += diesel::update(restaurants::table.filter(restaurants::id.eq_any(chunk.to_vec())))
                .set((
                    restaurants::in_guide.eq(false),
                    restaurants::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
        }
        Ok(cleared)
    }

    /// Upsert the restaurant and merge the fact's award in one transaction.
    pub async fn apply_fact(
        &self,
        fact: &RestaurantFact,
        origin: &FactOrigin,
        options: ApplyOptions,
    ) -> Result<ApplyOutcome, DieselError> {
        let award = fact.award_fact(origin);
        let _guard = self.write_lock.lock().await;
        let mut conn = self.pool.get().await?;

        conn.transaction(|conn| {
            Box::pin(async move {
                let existing = if options.match_website && !fact.website_url.is_empty() {
                    match find_by_website(conn, &fact.website_url).await? {
                        Some(record) => Some(record),
                        None => find_by_url(conn, &fact.url).await?,
                    }
                } else {
                    find_by_url(conn, &fact.url).await?
                };

                let (restaurant_id, restaurant) = match existing {
                    Some(record) => {
                        let change = update_restaurant(conn, &record, fact, options).await?;
                        (record.id, change)
                    }
                    None => (
                        insert_restaurant(conn, fact, options.in_guide_on_create).await?,
                        RecordChange::Created,
                    ),
                };

                let award = match award {
                    Some(award) => merge_award(conn, restaurant_id, &award).await?,
                    None => AwardOutcome::Skipped,
                };

                Ok(ApplyOutcome {
                    restaurant_id,
                    restaurant,
                    award,
                })
            })
        })
        .await
    }
}

async fn find_by_url(
    conn: &mut SqliteConn,
    url: &str,
) -> Result<Option<RestaurantRecord>, DieselError> {
    restaurants::table
        .filter(restaurants::url.eq(url))
        .first::<RestaurantRecord>(conn)
        .await
        .optional()
}

async fn find_by_website(
    conn: &mut SqliteConn,
    website_url: &str,
) -> Result<Option<RestaurantRecord>, DieselError> {
    if website_url.is_empty() {
        return Ok(None);
    }
    restaurants::table
        .filter(restaurants::website_url.eq(website_url))
        .first::<RestaurantRecord>(conn)
        .await
        .optional()
}

/// A website URL is unique across restaurants; one already claimed by a
/// different row is dropped rather than failing the whole fact.
async fn claimable_website<'a>(
    conn: &mut SqliteConn,
    website_url: &'a str,
    owner: Option<i32>,
) -> Result<&'a str, DieselError> {
    match find_by_website(conn, website_url).await? {
        Some(other) if Some(other.id) != owner => {
            warn!(
                "Website {} already belongs to {}, not storing it twice",
                website_url, other.url
            );
            Ok("")
        }
        _ => Ok(website_url),
    }
}

fn known_coordinate(value: &str) -> bool {
    !value.is_empty() && value != UNKNOWN_COORDINATE
}

async fn insert_restaurant(
    conn: &mut SqliteConn,
    fact: &RestaurantFact,
    in_guide: bool,
) -> Result<i32, DieselError> {
    let now = Utc::now().to_rfc3339();
    let website_url = claimable_website(conn, &fact.website_url, None).await?;
    let latitude = if known_coordinate(&fact.latitude) {
        fact.latitude.as_str()
    } else {
        UNKNOWN_COORDINATE
    };
    let longitude = if known_coordinate(&fact.longitude) {
        fact.longitude.as_str()
    } else {
        UNKNOWN_COORDINATE
    };

    diesel::insert_into(restaurants::table)
        .values(&NewRestaurant {
            url: &fact.url,
            name: &fact.name,
            description: &fact.description,
            address: &fact.address,
            location: &fact.location,
            latitude,
            longitude,
            cuisine: &fact.cuisine,
            facilities_and_services: &fact.facilities_and_services,
            phone_number: &fact.phone_number,
            website_url,
            image_url: fact.image_url.as_deref(),
            in_guide,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)
        .await?;

    debug!("Created restaurant {}", fact.url);

    restaurants::table
        .filter(restaurants::url.eq(&fact.url))
        .select(restaurants::id)
        .first::<i32>(conn)
        .await
}

async fn update_restaurant(
    conn: &mut SqliteConn,
    record: &RestaurantRecord,
    fact: &RestaurantFact,
    options: ApplyOptions,
) -> Result<RecordChange, DieselError> {
    let now = Utc::now().to_rfc3339();
    let mut changed = false;

    if options.update_details {
        fn pick<'a>(incoming: &'a str, stored: &'a str) -> &'a str {
            if incoming.is_empty() {
                stored
            } else {
                incoming
            }
        }

        let website_url = if fact.website_url.is_empty() {
            record.website_url.as_str()
        } else {
            claimable_website(conn, &fact.website_url, Some(record.id)).await?
        };
        let website_url = pick(website_url, &record.website_url);
        let (latitude, longitude) =
            if known_coordinate(&fact.latitude) && known_coordinate(&fact.longitude) {
                (fact.latitude.as_str(), fact.longitude.as_str())
            } else {
                (record.latitude.as_str(), record.longitude.as_str())
            };

        let changeset = RestaurantChangeset {
            name: pick(&fact.name, &record.name),
            description: pick(&fact.description, &record.description),
            address: pick(&fact.address, &record.address),
            location: pick(&fact.location, &record.location),
            latitude,
            longitude,
            cuisine: pick(&fact.cuisine, &record.cuisine),
            facilities_and_services: pick(
                &fact.facilities_and_services,
                &record.facilities_and_services,
            ),
            phone_number: pick(&fact.phone_number, &record.phone_number),
            website_url,
            image_url: fact.image_url.as_deref().or(record.image_url.as_deref()),
            updated_at: &now,
        };

        let differs = changeset.name != record.name
            || changeset.description != record.description
            || changeset.address != record.address
            || changeset.location != record.location
            || changeset.latitude != record.latitude
            || changeset.longitude != record.longitude
            || changeset.cuisine != record.cuisine
            || changeset.facilities_and_services != record.facilities_and_services
            || changeset.phone_number != record.phone_number
            || changeset.website_url != record.website_url
            || changeset.image_url != record.image_url.as_deref();

        if differs {
            diesel::update(restaurants::table.find(record.id))
                .set(&changeset)
                .execute(conn)
                .await?;
            changed = true;
        }
    }

    if let Some(in_guide) = options.force_in_guide {
        if in_guide != record.in_guide {
            diesel::update(restaurants::table.find(record.id))
                .set((
                    restaurants::in_guide.eq(in_guide),
                    restaurants::updated_at.eq(&now),
                ))
                .execute(conn)
                .await?;
            changed = true;
        }
    }

    Ok(if changed {
        RecordChange::Updated
    } else {
        RecordChange::Unchanged
    })
}

async fn merge_award(
    conn: &mut SqliteConn,
    restaurant_id: i32,
    incoming: &AwardFact,
) -> Result<AwardOutcome, DieselError> {
    let existing: Option<Award> = if incoming.year > 0 {
        restaurant_awards::table
            .filter(restaurant_awards::restaurant_id.eq(restaurant_id))
            .filter(restaurant_awards::year.eq(incoming.year))
            .first::<AwardRecord>(conn)
            .await
            .optional()?
            .map(Award::from)
    } else {
        None
    };

    let now = Utc::now().to_rfc3339();
    match MergePolicy::decide(existing.as_ref(), incoming) {
        MergeDecision::Create => {
            diesel::insert_into(restaurant_awards::table)
                .values(&NewAward {
                    restaurant_id,
                    year: incoming.year,
                    distinction: incoming.distinction.as_str(),
                    price: &incoming.price,
                    green_star: incoming.green_star,
                    provenance: incoming.provenance.as_str(),
                    wayback_url: incoming.wayback_url.as_deref(),
                    created_at: &now,
                    updated_at: &now,
                })
                .execute(conn)
                .await?;
            Ok(AwardOutcome::Created)
        }
        MergeDecision::Overwrite => {
            let Some(existing) = existing else {
                return Ok(AwardOutcome::Unchanged);
            };
            diesel::update(restaurant_awards::table.find(existing.id))
                .set((
                    restaurant_awards::distinction.eq(incoming.distinction.as_str()),
                    restaurant_awards::price.eq(&incoming.price),
                    restaurant_awards::green_star.eq(incoming.green_star),
                    restaurant_awards::provenance.eq(incoming.provenance.as_str()),
                    restaurant_awards::wayback_url.eq(incoming.wayback_url.as_deref()),
                    restaurant_awards::updated_at.eq(&now),
                ))
                .execute(conn)
                .await?;
            Ok(AwardOutcome::Updated)
        }
        MergeDecision::Unchanged => Ok(AwardOutcome::Unchanged),
        MergeDecision::Reject(reason) => {
            warn!(
                "Rejected {} award for restaurant {} in {}: {}",
                incoming.provenance.as_str(),
                restaurant_id,
                incoming.year,
                reason
            );
            Ok(AwardOutcome::Rejected(reason))
        }
    }
}
