use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity forwarded by the upstream authenticator.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserId(value.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}
