use bigdecimal::BigDecimal;
use inventory::{Inventory, InventoryError, Product};
use shared::{CartItem, Identity, LineItem, PlaceOrder};
use std::collections::HashMap;

use crate::models::Order;

/// Integer digits left by the NUMERIC(14, 2) total column.
const TOTAL_DIGITS: u32 = 12;

/// Prices a validated cart against current inventory.
///
/// Products are read in ascending id order so that concurrent placements
/// touching the same rows lock them in the same order. Lines come back in
/// cart order.
pub async fn price_cart<I: Inventory>(
    inventory: &mut I,
    order: &PlaceOrder,
) -> Result<Vec<LineItem>, InventoryError> {
    let mut by_id: Vec<&CartItem> = order.items().iter().collect();
    by_id.sort_by_key(|item| item.product_id);

    let mut products: HashMap<_, Product> = HashMap::with_capacity(by_id.len());
    for item in by_id {
        let product = inventory.get(item.product_id).await?;
        if item.quantity > product.stock {
            return Err(InventoryError::InsufficientStock {
                product_id: product.id,
                name: product.name,
                requested: item.quantity,
                available: product.stock,
            });
        }
        products.insert(product.id, product);
    }

    order
        .items()
        .iter()
        .map(|item| -> Result<LineItem, InventoryError> {
            let product = products
                .remove(&item.product_id)
                .ok_or(InventoryError::NotFound(item.product_id))?;
            Ok(LineItem {
                product_id: product.id,
                product_name: product.name,
                quantity: item.quantity,
                unit_price: product.price,
                image_url: product.image_url,
            })
        })
        .collect()
}

/// Prices the cart, takes the purchased units out of stock and builds the
/// pending order. Must run inside the caller's atomic unit: on any error the
/// caller discards every change made through `inventory`.
pub async fn place<I: Inventory>(
    inventory: &mut I,
    owner: &Identity,
    order: &PlaceOrder,
) -> Result<Order, InventoryError> {
    let lines = price_cart(inventory, order).await?;
    let pending = Order::pending(owner, lines, order.shipping_address().clone());
    if pending.total >= BigDecimal::from(10_i64.pow(TOTAL_DIGITS)) {
        return Err(InventoryError::Invalid(format!(
            "order total {} is too large",
            pending.total
        )));
    }

    for line in &pending.items {
        inventory
            .decrement_stock(line.product_id, line.quantity)
            .await?;
    }

    Ok(pending)
}
