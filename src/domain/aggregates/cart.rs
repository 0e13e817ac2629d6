//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::pricing::CartTotals;
use crate::domain::value_objects::{DiscountRate, Money};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "cart_status", rename_all = "lowercase")]
pub enum CartStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
}

impl CartStatus {
    /// Completed and abandoned carts never accept items or transition again.
    pub fn is_terminal(&self) -> bool { !matches!(self, CartStatus::Active) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(skip)]
    pub cart_items: Vec<CartItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn new(id: i64, user_id: i64, now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id, user_id, cart_items: vec![],
            subtotal: Money::ZERO, discount: Money::ZERO, tax: Money::ZERO, total: Money::ZERO,
            status: CartStatus::Active, created_at: now, updated_at: now, expires_at,
        }
    }

    pub fn is_active(&self) -> bool { self.status == CartStatus::Active }
    pub fn is_empty(&self) -> bool { self.cart_items.is_empty() }

    pub fn totals(&self) -> CartTotals {
        CartTotals { subtotal: self.subtotal, discount: self.discount, tax: self.tax, total: self.total }
    }

    pub fn apply_totals(&mut self, totals: CartTotals) {
        self.subtotal = totals.subtotal;
        self.discount = totals.discount;
        self.tax = totals.tax;
        self.total = totals.total;
    }
}

/// A cart line keyed by `(cart_id, product_id)`.
///
/// Name, description, price, discount and image are copied from the catalog when the line is
/// first added and are not refreshed afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub cart_id: i64,
    pub product_id: i64,
    pub name: String,
    pub description: String,
    pub quantity: i32,
    pub snapshot_price: Money,
    pub discount_rate: DiscountRate,
    pub total_price: Money,
    pub image_url: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
