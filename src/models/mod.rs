//! Data models for restaurants, awards and extracted facts.

mod award;
mod fact;
mod restaurant;

pub use award::{Award, AwardFact, Distinction, Provenance};
pub use fact::{FactOrigin, RestaurantFact};
pub use restaurant::{Restaurant, UNKNOWN_COORDINATE};
