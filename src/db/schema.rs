table! {
    dog_reports (id) {
        id -> Integer,
        user_id -> Text,
        latitude -> Double,
        longitude -> Double,
        status -> Text,
        description -> Nullable<Text>,
        photo_url -> Nullable<Text>,
        dog_count -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    status_updates (id) {
        id -> Integer,
        report_id -> Integer,
        user_id -> Text,
        status -> Text,
        note -> Nullable<Text>,
        photo_url -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

table! {
    profiles (id) {
        id -> Integer,
        user_id -> Text,
        display_name -> Nullable<Text>,
        avatar_url -> Nullable<Text>,
        is_admin -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    page_views (id) {
        id -> Integer,
        visitor_id -> Text,
        fingerprint -> Text,
        path -> Text,
        referrer -> Nullable<Text>,
        created_at -> Timestamp,
    }
}
