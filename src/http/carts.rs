//! Cart handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ApiError;
use super::extract::{CallerIdentity, ValidatedJson};
use super::AppState;
use crate::domain::aggregates::Cart;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AddItemRequest {
    #[validate(range(min = 1, message = "product_id is required"))]
    pub product_id: i64,
    /// Negative values take units away; zero is rejected by the service.
    pub quantity: i32,
}

pub async fn get_cart(State(state): State<AppState>, Path(user_id): Path<i64>, caller: CallerIdentity) -> Result<Json<Cart>, ApiError> {
    caller.ensure(user_id)?;
    Ok(Json(state.carts.get_cart(user_id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    caller: CallerIdentity,
    ValidatedJson(body): ValidatedJson<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    caller.ensure(user_id)?;
    Ok(Json(state.carts.add_item(user_id, body.product_id, body.quantity).await?))
}

pub async fn clear_cart(State(state): State<AppState>, Path(user_id): Path<i64>, caller: CallerIdentity) -> Result<Json<Cart>, ApiError> {
    caller.ensure(user_id)?;
    Ok(Json(state.carts.clear_cart(user_id).await?))
}

pub async fn complete_cart(State(state): State<AppState>, Path(user_id): Path<i64>, caller: CallerIdentity) -> Result<StatusCode, ApiError> {
    caller.ensure(user_id)?;
    state.carts.complete_cart(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
