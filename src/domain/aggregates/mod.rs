//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::Product;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderPatch, OrderStatus, UnknownStatus};
pub use cart::{Cart, CartItem, CartStatus};
