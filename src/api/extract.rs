//! Request extractors

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;

/// Header naming the owner a request acts for
pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner taken from the `X-Owner-Id` header
///
/// This only scopes records to an owner, it does not authenticate anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub crate::OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::InvalidRequest("missing X-Owner-Id header".to_string()))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map(Owner)
            .ok_or_else(|| ApiError::InvalidRequest("X-Owner-Id must be an integer".to_string()))
    }
}
