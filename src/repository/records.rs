//! Diesel row types for the restaurant and award tables.

use diesel::prelude::*;

use super::util::parse_datetime;
use crate::models::{Award, Distinction, Provenance, Restaurant};
use crate::schema;

/// Restaurant row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::restaurants)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RestaurantRecord {
    pub id: i32,
    pub url: String,
    pub name: String,
    pub description: String,
    pub address: String,
    pub location: String,
    pub latitude: String,
    pub longitude: String,
    pub cuisine: String,
    pub facilities_and_services: String,
    pub phone_number: String,
    pub website_url: String,
    pub image_url: Option<String>,
    pub in_guide: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// New restaurant for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::restaurants)]
pub struct NewRestaurant<'a> {
    pub url: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub address: &'a str,
    pub location: &'a str,
    pub latitude: &'a str,
    pub longitude: &'a str,
    pub cuisine: &'a str,
    pub facilities_and_services: &'a str,
    pub phone_number: &'a str,
    pub website_url: &'a str,
    pub image_url: Option<&'a str>,
    pub in_guide: bool,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Descriptive columns refreshed by a live crawl.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = schema::restaurants)]
pub struct RestaurantChangeset<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub address: &'a str,
    pub location: &'a str,
    pub latitude: &'a str,
    pub longitude: &'a str,
    pub cuisine: &'a str,
    pub facilities_and_services: &'a str,
    pub phone_number: &'a str,
    pub website_url: &'a str,
    pub image_url: Option<&'a str>,
    pub updated_at: &'a str,
}

/// Award row.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::restaurant_awards)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AwardRecord {
    pub id: i32,
    pub restaurant_id: i32,
    pub year: i32,
    pub distinction: String,
    pub price: String,
    pub green_star: bool,
    pub provenance: String,
    pub wayback_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New award for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::restaurant_awards)]
pub struct NewAward<'a> {
    pub restaurant_id: i32,
    pub year: i32,
    pub distinction: &'a str,
    pub price: &'a str,
    pub green_star: bool,
    pub provenance: &'a str,
    pub wayback_url: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

impl From<RestaurantRecord> for Restaurant {
    fn from(record: RestaurantRecord) -> Self {
        Restaurant {
            id: record.id,
            url: record.url,
            name: record.name,
            description: record.description,
            address: record.address,
            location: record.location,
            latitude: record.latitude,
            longitude: record.longitude,
            cuisine: record.cuisine,
            facilities_and_services: record.facilities_and_services,
            phone_number: record.phone_number,
            website_url: record.website_url,
            image_url: record.image_url,
            in_guide: record.in_guide,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

impl From<AwardRecord> for Award {
    fn from(record: AwardRecord) -> Self {
        Award {
            id: record.id,
            restaurant_id: record.restaurant_id,
            year: record.year,
            // Rows are written from the enum, so unknown labels only appear
            // after manual edits; treat them as the lowest tier.
            distinction: Distinction::from_str(&record.distinction)
                .unwrap_or(Distinction::SelectedRestaurants),
            price: record.price,
            green_star: record.green_star,
            provenance: Provenance::from_str(&record.provenance).unwrap_or(Provenance::Scrape),
            wayback_url: record.wayback_url,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}
