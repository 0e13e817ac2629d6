//! Cart use cases.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::aggregates::Cart;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::pricing::{self, CartTotals};
use crate::domain::value_objects::TaxRate;
use crate::messaging::EventPublisher;
use crate::store::{CartStore, StoreError};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    events: Arc<dyn EventPublisher>,
    tax_rate: TaxRate,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, events: Arc<dyn EventPublisher>, tax_rate: TaxRate) -> Self {
        Self { carts, events, tax_rate }
    }

    /// The user's active cart with its items and current aggregates.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: i64) -> Result<Cart> {
        let cart = self.carts.find_or_create_active_cart(user_id).await?;
        self.refresh(cart).await
    }

    /// Adds `quantity` units of a product; a negative quantity takes units away.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, user_id: i64, product_id: i64, quantity: i32) -> Result<Cart> {
        if quantity == 0 {
            return Err(EcommerceError::InvalidQuantity);
        }

        let cart = self.carts.find_or_create_active_cart(user_id).await?;
        let cart = match self.carts.upsert_item(cart.id, product_id, quantity).await {
            Ok(()) => cart,
            Err(StoreError::CartNotActive) => {
                // Completed or abandoned between lookup and write; the next active cart takes the item.
                debug!(cart_id = cart.id, "cart closed before item was added, retrying");
                let fresh = self.carts.find_or_create_active_cart(user_id).await?;
                self.carts.upsert_item(fresh.id, product_id, quantity).await?;
                fresh
            }
            Err(err) => return Err(err.into()),
        };
        self.refresh(cart).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: i64) -> Result<Cart> {
        let mut cart = self.carts.find_or_create_active_cart(user_id).await?;
        self.carts.clear(cart.id).await?;
        self.carts.save_totals(cart.id, CartTotals::default()).await?;

        cart.cart_items.clear();
        cart.apply_totals(CartTotals::default());
        Ok(cart)
    }

    /// Closes the active cart without placing an order.
    #[tracing::instrument(skip(self))]
    pub async fn complete_cart(&self, user_id: i64) -> Result<()> {
        let cart = self.carts.find_or_create_active_cart(user_id).await?;
        self.carts.set_completed(cart.id).await?;
        info!(cart_id = cart.id, "cart completed");

        super::publish(self.events.as_ref(), DomainEvent::Cart(CartEvent::Completed { cart_id: cart.id, user_id, order_id: None })).await;
        Ok(())
    }

    /// Abandons active carts that expired before `now`.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let count = self.carts.abandon_expired(now).await?;
        if count > 0 {
            info!(count, "abandoned expired carts");
            super::publish(self.events.as_ref(), DomainEvent::Cart(CartEvent::Abandoned { count })).await;
        }
        Ok(count)
    }

    /// Reloads the items, recomputes the aggregates and persists them when they moved.
    async fn refresh(&self, mut cart: Cart) -> Result<Cart> {
        cart.cart_items = self.carts.get_items(cart.id).await?;
        let totals = pricing::aggregate(&cart.cart_items, self.tax_rate)?;

        if totals != cart.totals() {
            self.carts.save_totals(cart.id, totals).await?;
            cart.apply_totals(totals);
        }
        Ok(cart)
    }
}

/// Runs [`CartService::sweep_expired`] every `every` until the runtime shuts down.
pub fn spawn_expiry_sweeper(service: Arc<CartService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match service.sweep_expired(Utc::now()).await {
                Ok(count) => debug!(count, "cart expiry sweep finished"),
                Err(err) => warn!(error = %err, "cart expiry sweep failed"),
            }
        }
    })
}
