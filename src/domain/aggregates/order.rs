//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown order status: {}", self.0) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn item_count(&self) -> usize { self.items.len() }

    /// Applies a patch in memory; stores persist the same rules.
    pub fn apply(&mut self, patch: &OrderPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status { self.status = status; }
        if let Some(address) = &patch.shipping_address { self.shipping_address = address.clone(); }
        self.updated_at = now;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    /// Effective unit price after discount.
    pub price: Money,
}

/// An order ready to be written; identity and timestamps are assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub user_id: i64,
    /// Active cart the order is placed from; completed together with the order.
    pub cart_id: i64,
    pub items: Vec<NewOrderItem>,
    pub total: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub payment_method: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub price: Money,
}

/// The only mutable parts of a placed order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<String>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool { self.status.is_none() && self.shipping_address.is_none() }
}
