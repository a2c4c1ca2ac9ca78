use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::models::{NewProduct, Product, ProductChanges, ProductPage, ProductQuery};
use crate::schema::products;
use crate::{Inventory, InventoryError};

/// Inventory view over a connection that is inside a transaction.
///
/// `get` takes a row lock (`FOR UPDATE`) so a product read during placement
/// cannot change underneath the caller before the transaction ends.
pub struct PgInventory<'c> {
    conn: &'c mut AsyncPgConnection,
}

impl<'c> PgInventory<'c> {
    pub fn new(conn: &'c mut AsyncPgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'c> Inventory for PgInventory<'c> {
    async fn get(&mut self, product_id: Uuid) -> Result<Product, InventoryError> {
        products::table
            .find(product_id)
            .for_update()
            .get_result::<Product>(self.conn)
            .await
            .optional()?
            .ok_or(InventoryError::NotFound(product_id))
    }

    async fn decrement_stock(&mut self, product_id: Uuid, amount: i32) -> Result<(), InventoryError> {
        let updated = diesel::update(
            products::table
                .filter(products::id.eq(product_id))
                .filter(products::stock.ge(amount)),
        )
        .set((
            products::stock.eq(products::stock - amount),
            products::updated_at.eq(Utc::now()),
        ))
        .execute(self.conn)
        .await?;

        if updated == 1 {
            debug!(%product_id, amount, "stock decremented");
            return Ok(());
        }

        let product = self.get(product_id).await?;
        Err(InventoryError::InsufficientStock {
            product_id,
            name: product.name,
            requested: amount,
            available: product.stock,
        })
    }
}

fn filtered(query: &ProductQuery) -> products::BoxedQuery<'static, diesel::pg::Pg> {
    let mut statement = products::table.into_boxed();
    if let Some(keyword) = query.keyword() {
        statement = statement.filter(products::name.ilike(format!("%{keyword}%")));
    }
    if let Some(category) = query.category() {
        statement = statement.filter(products::category.eq(category.to_string()));
    }
    statement
}

pub async fn list_products(
    conn: &mut AsyncPgConnection,
    query: &ProductQuery,
) -> Result<ProductPage, InventoryError> {
    let total = filtered(query).count().get_result::<i64>(conn).await?;

    let products = filtered(query)
        .order((products::created_at.desc(), products::id.desc()))
        .limit(query.limit())
        .offset(query.offset())
        .load::<Product>(conn)
        .await?;

    Ok(ProductPage::new(products, query, total))
}

pub async fn find_product(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
) -> Result<Product, InventoryError> {
    products::table
        .find(product_id)
        .first::<Product>(conn)
        .await
        .optional()?
        .ok_or(InventoryError::NotFound(product_id))
}

pub async fn create_product(
    conn: &mut AsyncPgConnection,
    product: NewProduct,
) -> Result<Product, InventoryError> {
    let product = diesel::insert_into(products::table)
        .values(&product)
        .get_result::<Product>(conn)
        .await?;
    Ok(product)
}

pub async fn update_product(
    conn: &mut AsyncPgConnection,
    product_id: Uuid,
    changes: ProductChanges,
) -> Result<Product, InventoryError> {
    diesel::update(products::table.find(product_id))
        .set(&changes)
        .get_result::<Product>(conn)
        .await
        .optional()?
        .ok_or(InventoryError::NotFound(product_id))
}
