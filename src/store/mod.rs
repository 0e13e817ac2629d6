//! Persistence for carts and orders.
//!
//! Two backends implement the same contracts: [`postgres`] for the service and [`memory`]
//! for tests and local tooling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::domain::aggregates::{Cart, CartItem, NewOrder, Order, OrderPatch};
use crate::domain::pricing::CartTotals;
use crate::domain::value_objects::MoneyError;
use crate::pagination::Page;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgCartStore, PgOrderStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The cart was completed or abandoned before the write could apply.
    #[error("cart is no longer active")]
    CartNotActive,

    #[error("amount out of range: {0}")]
    Amount(MoneyError),
}

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self { StoreError::NotFound { entity } }

    pub fn is_not_found(&self) -> bool { matches!(self, StoreError::NotFound { .. }) }

    /// Wraps a driver error with the operation that failed. Integer overflow in the database
    /// (SQLSTATE 22003) becomes [`StoreError::Amount`].
    pub(crate) fn database(context: impl Into<String>) -> impl FnOnce(sqlx::Error) -> StoreError {
        let context = context.into();
        move |source| {
            let out_of_range = source.as_database_error().and_then(|e| e.code()).is_some_and(|code| code == NUMERIC_VALUE_OUT_OF_RANGE);
            if out_of_range {
                return StoreError::Amount(MoneyError::Overflow);
            }
            StoreError::Database { context, source }
        }
    }
}

const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Carts and their line items.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the user's active cart, creating an empty one when there is none.
    ///
    /// Concurrent callers for the same user always observe the same cart.
    async fn find_or_create_active_cart(&self, user_id: i64) -> StoreResult<Cart>;

    /// Loads a cart row by id, without items.
    async fn find_cart(&self, cart_id: i64) -> StoreResult<Cart>;

    /// Adds `quantity` to the `(cart_id, product_id)` line, inserting it with a price snapshot
    /// when missing. A resulting quantity of zero or less removes the line; a non-positive
    /// delta against a missing line is a no-op. Fails with [`StoreError::CartNotActive`] once
    /// the cart is terminal, and refreshes `expires_at` otherwise.
    async fn upsert_item(&self, cart_id: i64, product_id: i64, quantity: i32) -> StoreResult<()>;

    async fn get_items(&self, cart_id: i64) -> StoreResult<Vec<CartItem>>;

    async fn save_totals(&self, cart_id: i64, totals: CartTotals) -> StoreResult<()>;

    /// Deletes every line of the cart. The cart status is unchanged.
    async fn clear(&self, cart_id: i64) -> StoreResult<()>;

    /// Moves an active cart to `completed`.
    async fn set_completed(&self, cart_id: i64) -> StoreResult<()>;

    /// Moves active carts whose `expires_at` is before `now` to `abandoned`.
    async fn abandon_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Orders and their line items.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the order and all of its items atomically, completing the source cart in the same
    /// unit. Fails with [`StoreError::CartNotActive`] unless that cart is active and owned by
    /// the order's user, in which case nothing is written.
    async fn create(&self, order: NewOrder) -> StoreResult<Order>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Order>;

    /// Newest first, with the user's total order count.
    async fn list_by_user(&self, user_id: i64, page: Page) -> StoreResult<(Vec<Order>, i64)>;

    async fn update(&self, id: i64, patch: OrderPatch) -> StoreResult<Order>;

    async fn delete(&self, id: i64) -> StoreResult<()>;
}
