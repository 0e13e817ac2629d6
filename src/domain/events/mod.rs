//! Domain events
use serde::Serialize;

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Cart(CartEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: i64, user_id: i64, cart_id: i64, total: Money, item_count: usize },
    StatusChanged { order_id: i64, from: OrderStatus, to: OrderStatus },
    Deleted { order_id: i64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    Completed { cart_id: i64, user_id: i64, order_id: Option<i64> },
    Abandoned { count: u64 },
}

impl DomainEvent {
    /// Message subject the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::Order(OrderEvent::Placed { .. }) => "storefront.orders.placed",
            DomainEvent::Order(OrderEvent::StatusChanged { .. }) => "storefront.orders.status_changed",
            DomainEvent::Order(OrderEvent::Deleted { .. }) => "storefront.orders.deleted",
            DomainEvent::Cart(CartEvent::Completed { .. }) => "storefront.carts.completed",
            DomainEvent::Cart(CartEvent::Abandoned { .. }) => "storefront.carts.abandoned",
        }
    }
}
