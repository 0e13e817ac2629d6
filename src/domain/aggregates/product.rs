//! Product Aggregate
//!
//! Catalog management lives elsewhere; carts only read products to take price snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{DiscountRate, Money};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount_rate: DiscountRate,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id, name: name.into(), description: String::new(), price, discount_rate: DiscountRate::NONE,
            image_url: String::new(), created_at: now, updated_at: now,
        }
    }

    pub fn with_discount(mut self, rate: DiscountRate) -> Self { self.discount_rate = rate; self }
    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }
}
