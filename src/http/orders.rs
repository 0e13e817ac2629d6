//! Order handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use super::error::ApiError;
use super::extract::{CallerIdentity, ValidatedJson};
use super::AppState;
use crate::domain::aggregates::{Order, OrderPatch, OrderStatus};
use crate::pagination::{Page, Paginated};
use crate::services::PlaceOrder;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CreateOrderRequest {
    #[validate(range(min = 1, message = "user_id is required"))]
    pub user_id: i64,
    #[validate(range(min = 1, message = "cart_id is required"))]
    pub cart_id: i64,
    #[validate(length(min = 1, max = 500, message = "shipping_address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, max = 50, message = "payment_method is required"))]
    pub payment_method: String,
}

impl From<CreateOrderRequest> for PlaceOrder {
    fn from(r: CreateOrderRequest) -> Self {
        PlaceOrder { user_id: r.user_id, cart_id: r.cart_id, shipping_address: r.shipping_address, payment_method: r.payment_method }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    #[validate(length(min = 1, max = 500, message = "shipping_address must not be empty"))]
    pub shipping_address: Option<String>,
}

impl UpdateOrderRequest {
    pub fn into_patch(self) -> Result<OrderPatch, ValidationErrors> {
        let status = match self.status {
            None => None,
            Some(raw) => match raw.parse::<OrderStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    let mut error = ValidationError::new("oneof");
                    error.message = Some("status must be one of pending, processing, shipped, delivered, cancelled".into());
                    let mut errors = ValidationErrors::new();
                    errors.add("status", error);
                    return Err(errors);
                }
            },
        };
        Ok(OrderPatch { status, shipping_address: self.shipping_address })
    }
}

/// Raw query values; unusable numbers fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

pub async fn create_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ValidatedJson(body): ValidatedJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    caller.ensure(body.user_id)?;
    let order = state.orders.create_order_from_cart(body.into()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<i64>, caller: CallerIdentity) -> Result<Json<Order>, ApiError> {
    let order = state.orders.find_by_id(id).await?;
    caller.ensure(order.user_id)?;
    Ok(Json(order))
}

/// Rejects an identified caller that does not own the order. Anonymous callers pass.
async fn ensure_owner(state: &AppState, caller: CallerIdentity, id: i64) -> Result<(), ApiError> {
    if caller.0.is_none() {
        return Ok(());
    }
    let order = state.orders.find_by_id(id).await?;
    caller.ensure(order.user_id)
}

pub async fn list_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    caller: CallerIdentity,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Order>>, ApiError> {
    caller.ensure(user_id)?;
    let page = Page::parse(params.page.as_deref(), params.limit.as_deref(), state.config.pagination_limit, state.config.pagination_max_limit);
    Ok(Json(state.orders.list_by_user(user_id, page).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: CallerIdentity,
    ValidatedJson(body): ValidatedJson<UpdateOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let patch = body.into_patch()?;
    ensure_owner(&state, caller, id).await?;
    Ok(Json(state.orders.update(id, patch).await?))
}

pub async fn delete_order(State(state): State<AppState>, Path(id): Path<i64>, caller: CallerIdentity) -> Result<StatusCode, ApiError> {
    ensure_owner(&state, caller, id).await?;
    state.orders.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
