//! Fixtures shared by the unit tests.

use bigdecimal::BigDecimal;
use chrono::Utc;
use inventory::{NewProduct, Product};
use shared::{CartItem, Identity, PlaceOrder, Role, ShippingAddress};
use uuid::Uuid;

pub fn product(name: &str, price: i32, stock: i32) -> Product {
    NewProduct {
        id: Uuid::new_v4(),
        name: name.to_string(),
        image_url: format!("/images/{name}.jpg"),
        category: String::new(),
        price: BigDecimal::from(price),
        stock,
    }
    .into_product(Utc::now())
}

pub fn customer() -> Identity {
    Identity {
        id: Uuid::new_v4(),
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        role: Role::Customer,
    }
}

pub fn admin() -> Identity {
    Identity {
        id: Uuid::new_v4(),
        name: "Grace".to_string(),
        email: "grace@example.com".to_string(),
        role: Role::Admin,
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        address: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        postal_code: "12345".to_string(),
        country: "US".to_string(),
    }
}

/// A validated cart of `(product, quantity)` lines shipped to [`address`].
pub fn cart(items: &[(Uuid, i32)]) -> PlaceOrder {
    PlaceOrder::new(
        items
            .iter()
            .map(|&(product_id, quantity)| CartItem { product_id, quantity })
            .collect(),
        address(),
    )
    .unwrap()
}
