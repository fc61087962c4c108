diesel::table! {
    images (id) {
        id -> Int4,
        mission_id -> Int4,
        code -> Varchar,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        date -> Nullable<Timestamp>,
        date_start -> Nullable<Timestamp>,
        date_end -> Nullable<Timestamp>,
        geographic_name -> Nullable<Text>,
        features_text -> Nullable<Text>,
        tilt_text -> Nullable<Text>,
        focal_length_text -> Nullable<Text>,
        camera_model_text -> Nullable<Text>,
        camera_model_code -> Nullable<Text>,
        film_text -> Nullable<Text>,
        film_code -> Nullable<Text>,
        exposure_text -> Nullable<Text>,
        cloud_cover_text -> Nullable<Text>,
        date_text -> Nullable<Text>,
        caption_text -> Nullable<Text>,
        nadir_latitude -> Nullable<Float8>,
        nadir_longitude -> Nullable<Float8>,
        nadir_to_photo_text -> Nullable<Text>,
        sun_azimuth -> Nullable<Int4>,
        sun_elevation -> Nullable<Int4>,
        altitude -> Nullable<Int4>,
        rating -> Int4,
        votes -> Int4,
        in_group -> Bool,
        group_hides -> Bool,
    }
}

diesel::table! {
    image_locations (id) {
        id -> Int4,
        image_id -> Int4,
        preposition -> Text,
        location -> Text,
    }
}

diesel::table! {
    image_votes (id) {
        id -> Int4,
        user_id -> Int4,
        image_id -> Int4,
        vote -> Int4,
        date -> Timestamp,
    }
}

diesel::table! {
    missions (id) {
        id -> Int4,
        code -> Varchar,
        name -> Varchar,
    }
}

diesel::table! {
    tags (id) {
        id -> Int4,
        name -> Text,
        slug -> Nullable<Varchar>,
        descriptive_image_id -> Nullable<Int4>,
    }
}

diesel::table! {
    user_tags (id) {
        id -> Int4,
        user_id -> Int4,
        image_id -> Int4,
        tag_id -> Int4,
        date -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
    }
}

diesel::joinable!(image_locations -> images (image_id));
diesel::joinable!(image_votes -> images (image_id));
diesel::joinable!(image_votes -> users (user_id));
diesel::joinable!(images -> missions (mission_id));
diesel::joinable!(tags -> images (descriptive_image_id));
diesel::joinable!(user_tags -> images (image_id));
diesel::joinable!(user_tags -> tags (tag_id));
diesel::joinable!(user_tags -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    image_locations,
    image_votes,
    images,
    missions,
    tags,
    user_tags,
    users,
);

diesel::allow_columns_to_appear_in_same_group_by_clause!(
    users::id,
    users::username,
    image_votes::vote,
);
