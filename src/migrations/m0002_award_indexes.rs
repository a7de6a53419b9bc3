use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_award_indexes")
        .depends_on(&["0001_initial"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_restaurant_awards_restaurant_id ON restaurant_awards(restaurant_id)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_restaurant_awards_year ON restaurant_awards(year)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_restaurant_awards_distinction ON restaurant_awards(distinction)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_restaurant_awards_timeline ON restaurant_awards(restaurant_id, distinction, year)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_restaurants_in_guide ON restaurants(in_guide)",
        ))
}
