//! Storefront Orders
//!
//! Cart and order backend for a storefront.
//!
//! ## Features
//! - One active cart per user, with price snapshots taken when items are added
//! - Cart aggregates (subtotal, discount, tax, total) in integer minor units
//! - Atomic conversion of a cart into an order
//! - Order lookup, listing, status and address updates
//! - Cart expiry and domain events over NATS

use thiserror::Error;

pub mod config;
pub mod domain;
pub mod http;
pub mod messaging;
pub mod pagination;
pub mod services;
pub mod store;

pub use config::Config;
pub use domain::value_objects::{DiscountRate, Money, TaxRate};

use domain::value_objects::MoneyError;
use store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart is no longer active")]
    CartNotActive,

    #[error("Quantity must not be zero")]
    InvalidQuantity,

    #[error("Nothing to update")]
    InvalidPatch,

    #[error("Caller may not act for this user")]
    Forbidden,

    #[error("Amount out of range: {0}")]
    Pricing(#[from] MoneyError),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for EcommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CartNotActive => EcommerceError::CartNotActive,
            StoreError::Amount(e) => EcommerceError::Pricing(e),
            other => EcommerceError::Storage(other),
        }
    }
}

impl EcommerceError {
    pub fn is_not_found(&self) -> bool { matches!(self, EcommerceError::Storage(e) if e.is_not_found()) }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
