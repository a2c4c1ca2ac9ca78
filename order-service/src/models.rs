use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use shared::{Identity, LineItem, OrderStatus, ShippingAddress};
use uuid::Uuid;

use crate::error::AppError;

/// Who placed the order, as known from their token at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOwner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub owner: OrderOwner,
    pub items: Vec<LineItem>,
    pub total: BigDecimal,
    pub shipping_address: ShippingAddress,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh order. The total is fixed here from the snapshotted lines and
    /// never recomputed afterwards.
    pub fn pending(owner: &Identity, items: Vec<LineItem>, shipping_address: ShippingAddress) -> Self {
        let total = items
            .iter()
            .fold(BigDecimal::zero(), |sum, line| sum + line.subtotal());
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            owner: OrderOwner {
                id: owner.id,
                name: owner.name.clone(),
                email: owner.email.clone(),
            },
            items,
            total,
            shipping_address,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub items: serde_json::Value,
    pub total: BigDecimal,
    pub shipping_address: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Order> for OrderRow {
    type Error = AppError;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        Ok(Self {
            id: order.id,
            user_id: order.owner.id,
            customer_name: order.owner.name.clone(),
            customer_email: order.owner.email.clone(),
            items: serde_json::to_value(&order.items)?,
            total: order.total.clone(),
            shipping_address: serde_json::to_value(&order.shipping_address)?,
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner: OrderOwner {
                id: row.user_id,
                name: row.customer_name,
                email: row.customer_email,
            },
            items: serde_json::from_value(row.items)?,
            total: row.total,
            shipping_address: serde_json::from_value(row.shipping_address)?,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{address, customer};

    fn line(price: &str, quantity: i32) -> LineItem {
        LineItem {
            product_id: Uuid::new_v4(),
            product_name: "Item".to_string(),
            quantity,
            unit_price: price.parse().unwrap(),
            image_url: String::new(),
        }
    }

    #[test]
    fn total_is_sum_of_line_subtotals() {
        let order = Order::pending(
            &customer(),
            vec![line("10.00", 2), line("2.50", 3)],
            address(),
        );
        assert_eq!(order.total, "27.50".parse::<BigDecimal>().unwrap());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn row_conversion_keeps_snapshot() {
        let order = Order::pending(&customer(), vec![line("3.99", 1)], address());
        let row = OrderRow::try_from(&order).unwrap();
        assert_eq!(row.status, "Pending");
        assert_eq!(row.items[0]["productName"], "Item");

        let restored = Order::try_from(row).unwrap();
        assert_eq!(restored, order);
    }

    #[test]
    fn unknown_status_in_row_is_corrupt() {
        let order = Order::pending(&customer(), vec![line("1", 1)], address());
        let mut row = OrderRow::try_from(&order).unwrap();
        row.status = "Lost".to_string();
        assert!(matches!(Order::try_from(row), Err(AppError::Corrupt(_))));
    }
}
