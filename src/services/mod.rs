//! Use cases over the stores.

use tracing::warn;

use crate::domain::events::DomainEvent;
use crate::messaging::EventPublisher;

pub mod carts;
pub mod orders;

pub use carts::{spawn_expiry_sweeper, CartService};
pub use orders::{OrderWorkflow, PlaceOrder};

/// Publication never fails the caller.
pub(crate) async fn publish(events: &dyn EventPublisher, event: DomainEvent) {
    if let Err(err) = events.publish(&event).await {
        warn!(subject = event.subject(), error = %err, "failed to publish event");
    }
}
