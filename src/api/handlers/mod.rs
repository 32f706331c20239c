//! Route handlers and the bearer-token helper they share.

pub mod groups;
pub mod health;
pub mod pk;
pub mod users;

use super::error::ApiError;
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Extract the token from `Authorization: Bearer <token>`.
///
/// A missing or malformed header is a client mistake, not a failed login, so it
/// maps to `InvalidInput`.
pub(crate) fn bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::invalid("missing authorization header"))?
        .to_str()
        .map_err(|_| ApiError::invalid("malformed authorization header"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ApiError::invalid("authorization header must be a bearer token")),
    }
}
