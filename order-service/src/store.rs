use async_trait::async_trait;
use inventory::{NewProduct, Product, ProductChanges, ProductPage, ProductQuery};
use shared::{Identity, OrderStatus, PlaceOrder};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Order;

/// Persistence handle shared by the request handlers.
///
/// `place_order` runs the whole placement (stock check, stock decrement,
/// order insert) as one atomic unit. Order listings are newest first with
/// the id as tie-breaker.
#[async_trait]
pub trait Store: Send + Sync {
    async fn place_order(&self, owner: &Identity, order: &PlaceOrder) -> Result<Order, AppError>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError>;

    async fn orders_for(&self, user_id: Uuid) -> Result<Vec<Order>, AppError>;

    async fn all_orders(&self) -> Result<Vec<Order>, AppError>;

    /// Moves the order to `to` only if it is still in `from`. Returns
    /// `AppError::Conflict` when another writer got there first.
    async fn set_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, AppError>;

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, AppError>;

    async fn find_product(&self, product_id: Uuid) -> Result<Product, AppError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, AppError>;

    async fn update_product(
        &self,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> Result<Product, AppError>;
}

pub(crate) fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
