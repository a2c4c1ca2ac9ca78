use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Product;
use crate::{Inventory, InventoryError};

/// Inventory over a product map owned by the caller.
///
/// Callers that need all-or-nothing behavior hand in a copy and swap it in
/// once the unit of work has succeeded.
pub struct MemoryInventory<'a> {
    products: &'a mut HashMap<Uuid, Product>,
}

impl<'a> MemoryInventory<'a> {
    pub fn new(products: &'a mut HashMap<Uuid, Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl<'a> Inventory for MemoryInventory<'a> {
    async fn get(&mut self, product_id: Uuid) -> Result<Product, InventoryError> {
        self.products
            .get(&product_id)
            .cloned()
            .ok_or(InventoryError::NotFound(product_id))
    }

    async fn decrement_stock(&mut self, product_id: Uuid, amount: i32) -> Result<(), InventoryError> {
        let product = self
            .products
            .get_mut(&product_id)
            .ok_or(InventoryError::NotFound(product_id))?;

        if product.stock < amount {
            return Err(InventoryError::InsufficientStock {
                product_id,
                name: product.name.clone(),
                requested: amount,
                available: product.stock,
            });
        }

        product.stock -= amount;
        product.updated_at = Utc::now();
        Ok(())
    }
}
