//! Order workflow: turning a cart into an order, and managing placed orders.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::aggregates::{NewOrder, NewOrderItem, Order, OrderPatch, OrderStatus};
use crate::domain::events::{CartEvent, DomainEvent, OrderEvent};
use crate::domain::pricing;
use crate::domain::value_objects::TaxRate;
use crate::messaging::EventPublisher;
use crate::pagination::{Page, Paginated};
use crate::store::{CartStore, OrderStore, StoreError};
use crate::{EcommerceError, Result};

/// Request to convert a cart into an order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaceOrder {
    pub user_id: i64,
    pub cart_id: i64,
    pub shipping_address: String,
    pub payment_method: String,
}

#[derive(Clone)]
pub struct OrderWorkflow {
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    events: Arc<dyn EventPublisher>,
    tax_rate: TaxRate,
}

impl OrderWorkflow {
    pub fn new(carts: Arc<dyn CartStore>, orders: Arc<dyn OrderStore>, events: Arc<dyn EventPublisher>, tax_rate: TaxRate) -> Self {
        Self { carts, orders, events, tax_rate }
    }

    /// Places an order for the cart's current contents.
    ///
    /// The order store completes the cart in the same unit as the order, so of two placements
    /// racing for one cart exactly one succeeds. Clearing the cart's lines afterwards is best
    /// effort and its failure is only logged.
    #[tracing::instrument(skip(self, request), fields(user_id = request.user_id, cart_id = request.cart_id))]
    pub async fn create_order_from_cart(&self, request: PlaceOrder) -> Result<Order> {
        let cart = self.carts.find_cart(request.cart_id).await?;
        if cart.user_id != request.user_id {
            return Err(StoreError::not_found("cart").into());
        }
        if !cart.is_active() {
            return Err(EcommerceError::CartNotActive);
        }

        let items = self.carts.get_items(cart.id).await?;
        if items.is_empty() {
            return Err(EcommerceError::EmptyCart);
        }

        let totals = pricing::aggregate(&items, self.tax_rate)?;
        let order_items = items
            .iter()
            .map(|item| -> Result<NewOrderItem> {
                Ok(NewOrderItem { product_id: item.product_id, quantity: item.quantity, price: pricing::effective_unit_price(item)? })
            })
            .collect::<Result<Vec<_>>>()?;

        let order = self
            .orders
            .create(NewOrder {
                user_id: request.user_id,
                cart_id: cart.id,
                items: order_items,
                total: totals.total,
                status: OrderStatus::Pending,
                shipping_address: request.shipping_address,
                payment_method: request.payment_method,
            })
            .await?;
        info!(order_id = order.id, total = %order.total, items = order.item_count(), "order placed");

        super::publish(self.events.as_ref(), DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, user_id: order.user_id, cart_id: cart.id, total: order.total, item_count: order.item_count(),
        }))
        .await;

        self.finish_cart(cart.id, order.user_id, order.id).await;
        Ok(order)
    }

    async fn finish_cart(&self, cart_id: i64, user_id: i64, order_id: i64) {
        if let Err(err) = self.carts.clear(cart_id).await {
            warn!(cart_id, order_id, error = %err, "failed to clear cart after order");
        }
        super::publish(self.events.as_ref(), DomainEvent::Cart(CartEvent::Completed { cart_id, user_id, order_id: Some(order_id) })).await;
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Order> { Ok(self.orders.find_by_id(id).await?) }

    pub async fn list_by_user(&self, user_id: i64, page: Page) -> Result<Paginated<Order>> {
        let (orders, total) = self.orders.list_by_user(user_id, page).await?;
        Ok(Paginated::new(orders, total, page))
    }

    /// Changes status and/or shipping address. Any status may replace any other.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, id: i64, patch: OrderPatch) -> Result<Order> {
        if patch.is_empty() {
            return Err(EcommerceError::InvalidPatch);
        }

        let previous = match patch.status {
            Some(_) => Some(self.orders.find_by_id(id).await?.status),
            None => None,
        };
        let order = self.orders.update(id, patch).await?;

        if let Some(from) = previous.filter(|from| *from != order.status) {
            info!(order_id = id, %from, to = %order.status, "order status changed");
            super::publish(self.events.as_ref(), DomainEvent::Order(OrderEvent::StatusChanged { order_id: id, from, to: order.status })).await;
        }
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.orders.delete(id).await?;
        super::publish(self.events.as_ref(), DomainEvent::Order(OrderEvent::Deleted { order_id: id })).await;
        Ok(())
    }
}
