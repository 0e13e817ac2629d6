//! HTTP surface

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::services::{CartService, OrderWorkflow};
use crate::Config;

pub mod carts;
pub mod error;
pub mod extract;
pub mod orders;

pub use error::ApiError;
pub use extract::{CallerIdentity, ValidatedJson, USER_ID_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderWorkflow>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-orders"})) }))
        .route("/api/v1/users/:user_id/cart", get(carts::get_cart))
        .route("/api/v1/users/:user_id/cart/items", post(carts::add_item).delete(carts::clear_cart))
        .route("/api/v1/users/:user_id/cart/complete", post(carts::complete_cart))
        .route("/api/v1/users/:user_id/orders", get(orders::list_orders))
        .route("/api/v1/orders", post(orders::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order).patch(orders::update_order).delete(orders::delete_order))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}
