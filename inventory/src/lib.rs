//! Product stock and catalog access.
//!
//! [`Inventory`] is the narrow interface order placement needs: read a
//! product and take units out of stock. Implementations are scoped to one
//! atomic unit of work. [`PgInventory`] borrows the connection of an open
//! transaction, [`MemoryInventory`] borrows a scratch copy of the product
//! map that the caller commits only when the whole unit succeeds.

mod memory;
pub mod models;
mod postgres;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryInventory;
pub use models::{
    CreateProduct, NewProduct, Product, ProductChanges, ProductPage, ProductQuery, UpdateProduct,
};
pub use postgres::{create_product, find_product, list_products, update_product, PgInventory};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("product {0} not found")]
    NotFound(Uuid),
    #[error("insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        name: String,
        requested: i32,
        available: i32,
    },
    #[error("invalid product: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[async_trait]
pub trait Inventory: Send {
    async fn get(&mut self, product_id: Uuid) -> Result<Product, InventoryError>;

    /// Removes `amount` units, failing without change when fewer remain.
    async fn decrement_stock(&mut self, product_id: Uuid, amount: i32) -> Result<(), InventoryError>;
}
