use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE restaurants (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    latitude TEXT NOT NULL DEFAULT '',
    longitude TEXT NOT NULL DEFAULT '',
    cuisine TEXT NOT NULL DEFAULT '',
    facilities_and_services TEXT NOT NULL DEFAULT '',
    phone_number TEXT NOT NULL DEFAULT '',
    website_url TEXT NOT NULL DEFAULT '',
    image_url TEXT,
    in_guide BOOLEAN NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE UNIQUE INDEX idx_restaurants_website_url ON restaurants(website_url) WHERE website_url != ''",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE restaurant_awards (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    restaurant_id INTEGER NOT NULL REFERENCES restaurants(id) ON DELETE CASCADE,
    year INTEGER NOT NULL CHECK (year > 0),
    distinction TEXT NOT NULL,
    price TEXT NOT NULL DEFAULT '',
    green_star BOOLEAN NOT NULL DEFAULT 0,
    provenance TEXT NOT NULL DEFAULT 'scrape',
    wayback_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (restaurant_id, year)
)"#,
        ))
}
