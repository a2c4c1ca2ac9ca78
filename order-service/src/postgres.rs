use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use inventory::{NewProduct, PgInventory, Product, ProductChanges, ProductPage, ProductQuery};
use shared::{Identity, OrderStatus, PlaceOrder};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Order, OrderRow};
use crate::placement;
use crate::schema::orders;
use crate::store::Store;

pub type DbPool = Pool<AsyncPgConnection>;

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, AppError> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn place_order(&self, owner: &Identity, order: &PlaceOrder) -> Result<Order, AppError> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let owner = owner.clone();
        let order = order.clone();
        let placed = conn
            .transaction::<_, AppError, _>(|conn| {
                Box::pin(async move {
                    let placed =
                        placement::place(&mut PgInventory::new(conn), &owner, &order).await?;

                    diesel::insert_into(orders::table)
                        .values(&OrderRow::try_from(&placed)?)
                        .execute(conn)
                        .await?;

                    Ok(placed)
                })
            })
            .await?;

        debug!(order_id = %placed.id, "order row committed");
        Ok(placed)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        let mut conn = self.pool.get().await?;

        orders::table
            .find(order_id)
            .first::<OrderRow>(&mut conn)
            .await
            .optional()?
            .map(Order::try_from)
            .transpose()
    }

    async fn orders_for(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let mut conn = self.pool.get().await?;

        let rows = orders::table
            .filter(orders::user_id.eq(user_id))
            .order((orders::created_at.desc(), orders::id.desc()))
            .load::<OrderRow>(&mut conn)
            .await?;

        into_orders(rows)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, AppError> {
        let mut conn = self.pool.get().await?;

        let rows = orders::table
            .order((orders::created_at.desc(), orders::id.desc()))
            .load::<OrderRow>(&mut conn)
            .await?;

        into_orders(rows)
    }

    async fn set_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, AppError> {
        let mut conn = self.pool.get().await?;

        let row = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::status.eq(from.as_str())),
        )
        .set((
            orders::status.eq(to.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .get_result::<OrderRow>(&mut conn)
        .await
        .optional()?;

        match row {
            Some(row) => Order::try_from(row),
            None => Err(AppError::Conflict(format!(
                "order {order_id} is no longer {from}"
            ))),
        }
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, AppError> {
        let mut conn = self.pool.get().await?;
        Ok(inventory::list_products(&mut conn, query).await?)
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Product, AppError> {
        let mut conn = self.pool.get().await?;
        Ok(inventory::find_product(&mut conn, product_id).await?)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, AppError> {
        let mut conn = self.pool.get().await?;
        Ok(inventory::create_product(&mut conn, product).await?)
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> Result<Product, AppError> {
        let mut conn = self.pool.get().await?;
        Ok(inventory::update_product(&mut conn, product_id, changes).await?)
    }
}
