use async_trait::async_trait;
use chrono::Utc;
use inventory::{MemoryInventory, NewProduct, Product, ProductChanges, ProductPage, ProductQuery};
use shared::{Identity, OrderStatus, PlaceOrder};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Order;
use crate::placement;
use crate::store::{newest_first, Store};

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
}

/// Process-local store. Every write goes through one mutex, which makes it
/// the single serialization point for stock changes.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            state: Mutex::new(State {
                products,
                orders: HashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn place_order(&self, owner: &Identity, order: &PlaceOrder) -> Result<Order, AppError> {
        let mut state = self.state.lock().await;

        // Work on a copy so a failed placement leaves no trace.
        let mut scratch = state.products.clone();
        let placed = placement::place(&mut MemoryInventory::new(&mut scratch), owner, order).await?;

        state.products = scratch;
        state.orders.insert(placed.id, placed.clone());
        Ok(placed)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn orders_for(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.owner.id == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self.state.lock().await.orders.values().cloned().collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn set_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, AppError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != from {
            return Err(AppError::Conflict(format!(
                "order {order_id} is {} now, expected {from}",
                order.status
            )));
        }

        order.status = to;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, AppError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Product> = state.products.values().filter(|p| query.matches(p)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let products = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(ProductPage::new(products, query, total))
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Product, AppError> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, AppError> {
        let product = product.into_product(Utc::now());
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> Result<Product, AppError> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))?;
        changes.apply(product);
        Ok(product.clone())
    }
}
