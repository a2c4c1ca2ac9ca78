diesel::table! {
    orders (id) {
        id -> Uuid,
        user_id -> Uuid,
        customer_name -> Varchar,
        customer_email -> Varchar,
        items -> Jsonb,
        total -> Numeric,
        shipping_address -> Jsonb,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
