//! Error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use thiserror::Error;
use validator::ValidationErrors;

use crate::store::StoreError;
use crate::EcommerceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Domain(#[from] EcommerceError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => match err {
                EcommerceError::EmptyCart | EcommerceError::InvalidQuantity | EcommerceError::InvalidPatch | EcommerceError::Pricing(_) => {
                    StatusCode::BAD_REQUEST
                }
                EcommerceError::Forbidden => StatusCode::FORBIDDEN,
                EcommerceError::CartNotActive => StatusCode::CONFLICT,
                EcommerceError::Storage(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
                EcommerceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self { ApiError::Domain(err.into()) }
}

/// `{field: first message}` for every invalid field.
fn field_messages(errors: &ValidationErrors) -> Map<String, Value> {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errors)| {
            let first = errors.first()?;
            let message = first.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| first.code.to_string());
            Some((field.to_string(), Value::String(message)))
        })
        .collect()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Validation(errors) => json!({ "errors": field_messages(errors) }),
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "request failed");
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
