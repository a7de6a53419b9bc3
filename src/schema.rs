// Kept in sync with the migrations in src/migrations.

diesel::table! {
    restaurants (id) {
        id -> Integer,
        url -> Text,
        name -> Text,
        description -> Text,
        address -> Text,
        location -> Text,
        latitude -> Text,
        longitude -> Text,
        cuisine -> Text,
        facilities_and_services -> Text,
        phone_number -> Text,
        website_url -> Text,
        image_url -> Nullable<Text>,
        in_guide -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    restaurant_awards (id) {
        id -> Integer,
        restaurant_id -> Integer,
        year -> Integer,
        distinction -> Text,
        price -> Text,
        green_star -> Bool,
        provenance -> Text,
        wayback_url -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(restaurant_awards -> restaurants (restaurant_id));

diesel::allow_tables_to_appear_in_same_query!(restaurant_awards, restaurants,);
