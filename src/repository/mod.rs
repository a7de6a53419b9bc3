//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking.

pub mod fact_store;
pub mod migrations;
pub mod pool;
pub mod records;
pub mod util;

pub use fact_store::{
    ApplyOptions, ApplyOutcome, AwardOutcome, DieselFactStore, RecordChange, StoreCounts,
};
pub use pool::{DieselError, SqlitePool};
pub use util::parse_datetime;
