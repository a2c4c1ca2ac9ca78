use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of an order.
///
/// The forward path is `Pending -> Processing -> Shipped -> Delivered`.
/// `Canceled` is reachable only before the order ships. `Delivered` and
/// `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move order from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Canceled => "Canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }

    /// Cancellation is possible until the parcel leaves the warehouse.
    pub fn is_cancelable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    // Position on the forward path. Canceled sits outside it.
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Canceled => None,
        }
    }

    /// Transition requested by the customer who owns the order.
    pub fn cancel(self) -> Result<OrderStatus, TransitionError> {
        if self.is_cancelable() {
            Ok(OrderStatus::Canceled)
        } else {
            Err(TransitionError {
                from: self,
                to: OrderStatus::Canceled,
            })
        }
    }

    /// Transition requested by an administrator.
    ///
    /// Terminal states never change, setting the current status again is
    /// rejected, and the forward path may skip ahead but never go back.
    pub fn transition_to(self, to: OrderStatus) -> Result<OrderStatus, TransitionError> {
        let rejected = TransitionError { from: self, to };

        if self.is_terminal() || self == to {
            return Err(rejected);
        }

        match (self.rank(), to.rank()) {
            (_, None) => self.cancel().map_err(|_| rejected),
            (Some(from), Some(next)) if next > from => Ok(to),
            _ => Err(rejected),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// The authenticated caller, as attached to a request by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners see their own orders; administrators see everything.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    fn validated(self) -> Result<Self, ValidationError> {
        let fields = [
            ("address", &self.address),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ValidationError(format!("shipping address is missing {name}")));
        }

        Ok(Self {
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self.country.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Order placement body as it arrives over the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<CartItem>,
    pub shipping_address: ShippingAddress,
}

/// A cart that passed boundary validation: at least one line, every
/// quantity positive, one line per product, complete address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    items: Vec<CartItem>,
    shipping_address: ShippingAddress,
}

impl PlaceOrder {
    pub fn new(
        items: Vec<CartItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Self, ValidationError> {
        if items.is_empty() {
            return Err(ValidationError("cart is empty".to_string()));
        }

        let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity < 1 {
                return Err(ValidationError(format!(
                    "quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            match merged.iter_mut().find(|m| m.product_id == item.product_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(item.quantity)
                        .ok_or_else(|| {
                            ValidationError(format!(
                                "quantity for product {} is too large",
                                item.product_id
                            ))
                        })?;
                }
                None => merged.push(item),
            }
        }

        Ok(Self {
            items: merged,
            shipping_address: shipping_address.validated()?,
        })
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }
}

impl TryFrom<PlaceOrderRequest> for PlaceOrder {
    type Error = ValidationError;

    fn try_from(request: PlaceOrderRequest) -> Result<Self, Self::Error> {
        PlaceOrder::new(request.items, request.shipping_address)
    }
}

/// Product data frozen onto an order at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub image_url: String,
}

impl LineItem {
    pub fn subtotal(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn customers_cancel_only_before_shipping() {
        assert_eq!(OrderStatus::Pending.cancel(), Ok(OrderStatus::Canceled));
        assert_eq!(OrderStatus::Processing.cancel(), Ok(OrderStatus::Canceled));
        for status in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Canceled] {
            assert_eq!(
                status.cancel(),
                Err(TransitionError { from: status, to: OrderStatus::Canceled })
            );
        }
    }

    #[test]
    fn terminal_states_never_change() {
        for from in [OrderStatus::Delivered, OrderStatus::Canceled] {
            for to in OrderStatus::ALL {
                assert!(from.transition_to(to).is_err(), "{from} -> {to} should fail");
            }
        }
    }

    #[test]
    fn admin_moves_forward_only() {
        assert_eq!(
            OrderStatus::Pending.transition_to(OrderStatus::Processing),
            Ok(OrderStatus::Processing)
        );
        assert_eq!(
            OrderStatus::Pending.transition_to(OrderStatus::Shipped),
            Ok(OrderStatus::Shipped)
        );
        assert_eq!(
            OrderStatus::Shipped.transition_to(OrderStatus::Delivered),
            Ok(OrderStatus::Delivered)
        );
        assert!(OrderStatus::Shipped.transition_to(OrderStatus::Pending).is_err());
        assert!(OrderStatus::Processing.transition_to(OrderStatus::Processing).is_err());
        assert!(OrderStatus::Shipped.transition_to(OrderStatus::Canceled).is_err());
        assert_eq!(
            OrderStatus::Processing.transition_to(OrderStatus::Canceled),
            Ok(OrderStatus::Canceled)
        );
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert_eq!("Canceled".parse::<OrderStatus>(), Ok(OrderStatus::Canceled));
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn cart_lines_for_the_same_product_are_merged() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let order = PlaceOrder::new(
            vec![
                CartItem { product_id: p1, quantity: 1 },
                CartItem { product_id: p2, quantity: 4 },
                CartItem { product_id: p1, quantity: 2 },
            ],
            address(),
        )
        .unwrap();

        assert_eq!(
            order.items(),
            &[
                CartItem { product_id: p1, quantity: 3 },
                CartItem { product_id: p2, quantity: 4 },
            ]
        );
    }

    #[test]
    fn invalid_carts_are_rejected() {
        assert!(PlaceOrder::new(vec![], address()).is_err());

        let zero = vec![CartItem { product_id: Uuid::new_v4(), quantity: 0 }];
        assert!(PlaceOrder::new(zero, address()).is_err());

        let item = vec![CartItem { product_id: Uuid::new_v4(), quantity: 1 }];
        let mut blank_city = address();
        blank_city.city = "   ".to_string();
        let err = PlaceOrder::new(item, blank_city).unwrap_err();
        assert_eq!(err.0, "shipping address is missing city");
    }

    #[test]
    fn request_body_uses_camel_case() {
        let body = serde_json::json!({
            "items": [{ "productId": Uuid::nil(), "quantity": 2 }],
            "shippingAddress": {
                "address": "1 Main St",
                "city": "Springfield",
                "postalCode": "12345",
                "country": "US"
            }
        });
        let request: PlaceOrderRequest = serde_json::from_value(body).unwrap();
        let order = PlaceOrder::try_from(request).unwrap();
        assert_eq!(order.items()[0].quantity, 2);
        assert_eq!(order.shipping_address().postal_code, "12345");
    }

    #[test]
    fn line_subtotal_multiplies_price_by_quantity() {
        let line = LineItem {
            product_id: Uuid::new_v4(),
            product_name: "Mug".to_string(),
            quantity: 3,
            unit_price: "4.50".parse().unwrap(),
            image_url: String::new(),
        };
        assert_eq!(line.subtotal(), "13.50".parse::<BigDecimal>().unwrap());
    }
}
