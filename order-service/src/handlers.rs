use chrono::Utc;
use inventory::{CreateProduct, NewProduct, Product, ProductPage, ProductQuery, UpdateProduct};
use shared::{Identity, OrderStatus, PlaceOrder, TransitionError};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Order;
use crate::store::Store;

/// Order placement and the status workflow on top of a [`Store`].
///
/// Storage contention (`AppError::Conflict`) is retried up to
/// `max_attempts` times, each attempt starting again from a fresh read.
pub struct OrderService {
    store: Arc<dyn Store>,
    max_attempts: u32,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_once: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once().await {
                Err(AppError::Conflict(reason)) if attempt < self.max_attempts => {
                    warn!(operation, attempt, %reason, "Conflict, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    #[instrument(skip_all, fields(user_id = %identity.id))]
    pub async fn place_order(&self, identity: &Identity, order: PlaceOrder) -> Result<Order, AppError> {
        let order = &order;
        let placed = self
            .with_retry("place_order", move || self.store.place_order(identity, order))
            .await?;

        info!(
            order_id = %placed.id,
            total = %placed.total,
            lines = placed.items.len(),
            "Order placed"
        );
        Ok(placed)
    }

    pub async fn my_orders(&self, identity: &Identity) -> Result<Vec<Order>, AppError> {
        self.store.orders_for(identity.id).await
    }

    pub async fn all_orders(&self, identity: &Identity) -> Result<Vec<Order>, AppError> {
        require_admin(identity)?;
        self.store.all_orders().await
    }

    /// The order, if the caller owns it or is an administrator.
    pub async fn order(&self, identity: &Identity, order_id: Uuid) -> Result<Order, AppError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if !identity.can_access(order.owner.id) {
            return Err(AppError::Forbidden(format!(
                "order {order_id} belongs to another customer"
            )));
        }
        Ok(order)
    }

    #[instrument(skip_all, fields(user_id = %identity.id, %order_id))]
    pub async fn cancel(&self, identity: &Identity, order_id: Uuid) -> Result<Order, AppError> {
        self.transition(identity, order_id, "cancel_order", OrderStatus::cancel)
            .await
    }

    #[instrument(skip_all, fields(user_id = %identity.id, %order_id, %status))]
    pub async fn set_status(
        &self,
        identity: &Identity,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, AppError> {
        require_admin(identity)?;
        self.transition(identity, order_id, "set_status", move |current| {
            current.transition_to(status)
        })
        .await
    }

    async fn transition<R>(
        &self,
        identity: &Identity,
        order_id: Uuid,
        operation: &'static str,
        rule: R,
    ) -> Result<Order, AppError>
    where
        R: Fn(OrderStatus) -> Result<OrderStatus, TransitionError>,
    {
        let rule = &rule;
        let updated = self
            .with_retry(operation, move || self.transition_once(identity, order_id, rule))
            .await?;

        info!(status = %updated.status, "Order status changed");
        Ok(updated)
    }

    async fn transition_once<R>(
        &self,
        identity: &Identity,
        order_id: Uuid,
        rule: &R,
    ) -> Result<Order, AppError>
    where
        R: Fn(OrderStatus) -> Result<OrderStatus, TransitionError>,
    {
        let order = self.order(identity, order_id).await?;
        let next = rule(order.status)?;
        self.store.set_status(order_id, order.status, next).await
    }
}

/// Catalog reads for everyone, edits for administrators.
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, query: &ProductQuery) -> Result<ProductPage, AppError> {
        self.store.list_products(query).await
    }

    pub async fn get(&self, product_id: Uuid) -> Result<Product, AppError> {
        self.store.find_product(product_id).await
    }

    pub async fn create(
        &self,
        identity: &Identity,
        request: CreateProduct,
    ) -> Result<Product, AppError> {
        require_admin(identity)?;
        let product = self.store.create_product(NewProduct::try_from(request)?).await?;
        info!(product_id = %product.id, stock = product.stock, "Product created");
        Ok(product)
    }

    pub async fn update(
        &self,
        identity: &Identity,
        product_id: Uuid,
        request: UpdateProduct,
    ) -> Result<Product, AppError> {
        require_admin(identity)?;
        let changes = request.into_changes(Utc::now())?;
        self.store.update_product(product_id, changes).await
    }
}

fn require_admin(identity: &Identity) -> Result<(), AppError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("administrator role required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::{admin, cart, customer, product};
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use inventory::ProductChanges;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn service_with(products: Vec<Product>) -> (OrderService, CatalogService) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::with_products(products));
        (OrderService::new(store.clone(), 3), CatalogService::new(store))
    }

    #[tokio::test]
    async fn order_total_and_stock_follow_the_cart() {
        let p1 = product("p1", 10, 5);
        let id = p1.id;
        let (orders, catalog) = service_with(vec![p1]);

        let order = orders.place_order(&customer(), cart(&[(id, 2)])).await.unwrap();

        assert_eq!(order.total, BigDecimal::from(20));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(catalog.get(id).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn oversized_cart_leaves_stock_untouched() {
        let p1 = product("p1", 10, 5);
        let id = p1.id;
        let (orders, catalog) = service_with(vec![p1]);

        let err = orders.place_order(&customer(), cart(&[(id, 10)])).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { .. }));
        assert_eq!(catalog.get(id).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn snapshot_survives_catalog_edits() {
        let p1 = product("p1", 10, 5);
        let id = p1.id;
        let (orders, catalog) = service_with(vec![p1]);
        let buyer = customer();
        let placed = orders.place_order(&buyer, cart(&[(id, 2)])).await.unwrap();

        catalog
            .update(
                &admin(),
                id,
                UpdateProduct {
                    name: Some("renamed".to_string()),
                    price: Some(BigDecimal::from(99)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reread = orders.order(&buyer, placed.id).await.unwrap();
        assert_eq!(reread.items[0].product_name, "p1");
        assert_eq!(reread.items[0].unit_price, BigDecimal::from(10));
        assert_eq!(reread.total, BigDecimal::from(20));
    }

    #[tokio::test]
    async fn my_orders_are_newest_first_and_stable() {
        let p = product("p", 1, 10);
        let id = p.id;
        let (orders, _) = service_with(vec![p]);
        let buyer = customer();

        let mut placed = Vec::new();
        for _ in 0..3 {
            placed.push(orders.place_order(&buyer, cart(&[(id, 1)])).await.unwrap().id);
        }
        orders.place_order(&customer(), cart(&[(id, 1)])).await.unwrap();

        let first: Vec<Uuid> = orders.my_orders(&buyer).await.unwrap().iter().map(|o| o.id).collect();
        let second: Vec<Uuid> = orders.my_orders(&buyer).await.unwrap().iter().map(|o| o.id).collect();

        placed.reverse();
        assert_eq!(first, placed);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn owner_cancels_pending_order() {
        let p = product("p", 1, 10);
        let id = p.id;
        let (orders, _) = service_with(vec![p]);
        let buyer = customer();
        let placed = orders.place_order(&buyer, cart(&[(id, 1)])).await.unwrap();

        let canceled = orders.cancel(&buyer, placed.id).await.unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn shipped_order_cannot_be_canceled_by_owner() {
        let p = product("p", 1, 10);
        let id = p.id;
        let (orders, _) = service_with(vec![p]);
        let buyer = customer();
        let placed = orders.place_order(&buyer, cart(&[(id, 1)])).await.unwrap();
        orders
            .set_status(&admin(), placed.id, OrderStatus::Shipped)
            .await
            .unwrap();

        let err = orders.cancel(&buyer, placed.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(
            orders.order(&buyer, placed.id).await.unwrap().status,
            OrderStatus::Shipped
        );
    }

    #[tokio::test]
    async fn delivered_order_is_final() {
        let p = product("p", 1, 10);
        let id = p.id;
        let (orders, _) = service_with(vec![p]);
        let boss = admin();
        let placed = orders.place_order(&customer(), cart(&[(id, 1)])).await.unwrap();
        orders
            .set_status(&boss, placed.id, OrderStatus::Delivered)
            .await
            .unwrap();

        for status in OrderStatus::ALL {
            let err = orders.set_status(&boss, placed.id, status).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)), "{status}");
        }
    }

    #[tokio::test]
    async fn strangers_and_missing_orders_are_rejected() {
        let p = product("p", 1, 10);
        let id = p.id;
        let (orders, _) = service_with(vec![p]);
        let buyer = customer();
        let placed = orders.place_order(&buyer, cart(&[(id, 1)])).await.unwrap();
        let stranger = customer();

        assert!(matches!(
            orders.cancel(&stranger, placed.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            orders.set_status(&buyer, placed.id, OrderStatus::Shipped).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            orders.all_orders(&buyer).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            orders.cancel(&buyer, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));

        assert_eq!(orders.all_orders(&admin()).await.unwrap().len(), 1);
    }

    /// Fails the first `conflicts` placements with a storage conflict.
    struct Contended {
        inner: MemoryStore,
        conflicts: AtomicU32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Store for Contended {
        async fn place_order(&self, owner: &Identity, order: &PlaceOrder) -> Result<Order, AppError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::Conflict("could not serialize access".to_string()));
            }
            self.inner.place_order(owner, order).await
        }

        async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
            self.inner.find_order(order_id).await
        }

        async fn orders_for(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
            self.inner.orders_for(user_id).await
        }

        async fn all_orders(&self) -> Result<Vec<Order>, AppError> {
            self.inner.all_orders().await
        }

        async fn set_status(
            &self,
            order_id: Uuid,
            from: OrderStatus,
            to: OrderStatus,
        ) -> Result<Order, AppError> {
            self.inner.set_status(order_id, from, to).await
        }

        async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, AppError> {
            self.inner.list_products(query).await
        }

        async fn find_product(&self, product_id: Uuid) -> Result<Product, AppError> {
            self.inner.find_product(product_id).await
        }

        async fn create_product(&self, product: NewProduct) -> Result<Product, AppError> {
            self.inner.create_product(product).await
        }

        async fn update_product(
            &self,
            product_id: Uuid,
            changes: ProductChanges,
        ) -> Result<Product, AppError> {
            self.inner.update_product(product_id, changes).await
        }
    }

    fn contended(conflicts: u32, p: Product) -> Arc<Contended> {
        Arc::new(Contended {
            inner: MemoryStore::with_products([p]),
            conflicts: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn conflicts_are_retried_from_scratch() {
        let p = product("p", 10, 5);
        let id = p.id;
        let store = contended(2, p);
        let orders = OrderService::new(store.clone(), 3);

        let order = orders.place_order(&customer(), cart(&[(id, 2)])).await.unwrap();

        assert_eq!(order.total, BigDecimal::from(20));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(store.find_product(id).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let p = product("p", 10, 5);
        let id = p.id;
        let store = contended(5, p);
        let orders = OrderService::new(store.clone(), 3);

        let err = orders.place_order(&customer(), cart(&[(id, 2)])).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(store.find_product(id).await.unwrap().stock, 5);
    }

    #[tokio::test]
    async fn only_admins_create_products() {
        let (_, catalog) = service_with(vec![]);
        let request = || CreateProduct {
            name: "Lamp".to_string(),
            image_url: String::new(),
            category: "lighting".to_string(),
            price: BigDecimal::from(25),
            stock: 4,
        };

        assert!(matches!(
            catalog.create(&customer(), request()).await,
            Err(AppError::Forbidden(_))
        ));
        let created = catalog.create(&admin(), request()).await.unwrap();
        assert_eq!(catalog.get(created.id).await.unwrap().stock, 4);
    }
}
