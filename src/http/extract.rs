//! Request extractors

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::error::ApiError;
use crate::EcommerceError;

/// Header an upstream gateway uses to pass the authenticated user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// JSON body that has passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// The authenticated user, when the request came through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity(pub Option<i64>);

impl CallerIdentity {
    /// A caller with an identity may only act for itself.
    pub fn ensure(&self, user_id: i64) -> Result<(), ApiError> {
        match self.0 {
            Some(caller) if caller != user_id => Err(EcommerceError::Forbidden.into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(CallerIdentity(None));
        };
        raw.to_str()
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| CallerIdentity(Some(id)))
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn identity(header: Option<&str>) -> Result<CallerIdentity, ApiError> {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CallerIdentity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        assert_eq!(identity(None).await.unwrap(), CallerIdentity(None));
    }

    #[tokio::test]
    async fn test_header_is_parsed() {
        let caller = identity(Some("42")).await.unwrap();
        assert_eq!(caller, CallerIdentity(Some(42)));
        assert!(caller.ensure(42).is_ok());
        assert!(matches!(caller.ensure(7), Err(ApiError::Domain(EcommerceError::Forbidden))));
    }

    #[tokio::test]
    async fn test_malformed_header_is_rejected() {
        assert!(matches!(identity(Some("abc")).await, Err(ApiError::BadRequest(_))));
        assert!(matches!(identity(Some("0")).await, Err(ApiError::BadRequest(_))));
    }
}
