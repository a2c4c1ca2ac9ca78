use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::InventoryError;

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Integer digits left by the NUMERIC(12, 2) price column.
const PRICE_DIGITS: u32 = 10;

fn checked_price(price: BigDecimal) -> Result<BigDecimal, InventoryError> {
    if price < BigDecimal::from(0) {
        return Err(InventoryError::Invalid("price must not be negative".to_string()));
    }
    let cents = price.with_scale(2);
    if cents != price {
        return Err(InventoryError::Invalid(
            "price must have at most two decimal places".to_string(),
        ));
    }
    if cents >= BigDecimal::from(10_i64.pow(PRICE_DIGITS)) {
        return Err(InventoryError::Invalid("price is too large".to_string()));
    }
    Ok(cents)
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub image_url: String,
    pub category: String,
    pub price: BigDecimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct {
    pub id: Uuid,
    pub name: String,
    pub image_url: String,
    pub category: String,
    pub price: BigDecimal,
    pub stock: i32,
}

/// Catalog entry as submitted by an administrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
    pub price: BigDecimal,
    pub stock: i32,
}

impl TryFrom<CreateProduct> for NewProduct {
    type Error = InventoryError;

    fn try_from(request: CreateProduct) -> Result<Self, Self::Error> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(InventoryError::Invalid("name is required".to_string()));
        }
        if request.stock < 0 {
            return Err(InventoryError::Invalid("stock must not be negative".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image_url: request.image_url.trim().to_string(),
            category: request.category.trim().to_string(),
            price: checked_price(request.price)?,
            stock: request.stock,
        })
    }
}

impl NewProduct {
    /// Materializes the row the way the database defaults would.
    pub fn into_product(self, now: DateTime<Utc>) -> Product {
        Product {
            id: self.id,
            name: self.name,
            image_url: self.image_url,
            category: self.category,
            price: self.price,
            stock: self.stock,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Catalog edit. Stock has no field here: after creation it only
/// moves through `Inventory::decrement_stock`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub price: Option<BigDecimal>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub price: Option<BigDecimal>,
    pub updated_at: DateTime<Utc>,
}

impl UpdateProduct {
    pub fn into_changes(self, now: DateTime<Utc>) -> Result<ProductChanges, InventoryError> {
        let name = match self.name.map(|n| n.trim().to_string()) {
            Some(name) if name.is_empty() => {
                return Err(InventoryError::Invalid("name is required".to_string()))
            }
            name => name,
        };
        let price = self.price.map(checked_price).transpose()?;

        Ok(ProductChanges {
            name,
            image_url: self.image_url.map(|u| u.trim().to_string()),
            category: self.category.map(|c| c.trim().to_string()),
            price,
            updated_at: now,
        })
    }
}

impl ProductChanges {
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(image_url) = self.image_url {
            product.image_url = image_url;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        product.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ProductQuery {
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Saturates for absurd page numbers, which then simply match nothing.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Same predicate the SQL listing applies, for stores without SQL.
    pub fn matches(&self, product: &Product) -> bool {
        let keyword = self.keyword().map_or(true, |k| {
            product.name.to_lowercase().contains(&k.to_lowercase())
        });
        let category = self.category().map_or(true, |c| product.category == c);
        keyword && category
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: i64,
    pub pages: i64,
    pub total: i64,
}

impl ProductPage {
    pub fn new(products: Vec<Product>, query: &ProductQuery, total: i64) -> Self {
        let limit = query.limit();
        Self {
            products,
            page: query.page(),
            pages: (total + limit - 1) / limit,
            total,
        }
    }
}
