diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        image_url -> Varchar,
        category -> Varchar,
        price -> Numeric,
        stock -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
