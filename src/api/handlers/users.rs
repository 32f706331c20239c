//! Account endpoints: signup, login, token refresh and the caller's own profile.

use super::bearer;
use crate::{
    api::error::{ApiError, ErrorResponse},
    aurum::Aurum,
    models::{GroupWithRole, User},
    token::TokenPair,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

#[utoipa::path(
    post,
    path = "/signup",
    request_body = User,
    responses(
        (status = 201, description = "User created and added to the root group.", body = User),
        (status = 400, description = "Missing username or weak password.", body = ErrorResponse),
        (status = 409, description = "Username already taken.", body = ErrorResponse),
    ),
    tag = "users"
)]
pub async fn signup(
    aurum: Extension<Aurum>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(user) = payload?;
    let created = aurum.sign_up(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = User,
    responses(
        (status = 200, description = "Access and refresh tokens.", body = TokenPair),
        (status = 401, description = "Unknown user or wrong password.", body = ErrorResponse),
    ),
    tag = "users"
)]
pub async fn login(
    aurum: Extension<Aurum>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(user) = payload?;
    Ok(Json(aurum.login(user).await?))
}

#[utoipa::path(
    post,
    path = "/refresh",
    request_body = TokenPair,
    responses(
        (status = 200, description = "A fresh access token.", body = TokenPair),
        (status = 400, description = "Missing refresh token or an access token was sent.", body = ErrorResponse),
        (status = 401, description = "Refresh token rejected.", body = ErrorResponse),
    ),
    tag = "users"
)]
pub async fn refresh(
    aurum: Extension<Aurum>,
    payload: Result<Json<TokenPair>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(pair) = payload?;
    let mut renewed = aurum.refresh_token(pair).await?;
    // The client already holds its refresh token; only the access token goes back.
    renewed.refresh_token.clear();
    Ok(Json(renewed))
}

#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "The caller's account.", body = User),
        (status = 400, description = "Missing bearer token or a refresh token was sent.", body = ErrorResponse),
        (status = 401, description = "Invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    headers: HeaderMap,
    aurum: Extension<Aurum>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(aurum.get_user(bearer(&headers)?).await?))
}

#[utoipa::path(
    post,
    path = "/user",
    request_body = User,
    responses(
        (status = 200, description = "The updated account.", body = User),
        (status = 400, description = "Weak password or bad input.", body = ErrorResponse),
        (status = 401, description = "Invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    headers: HeaderMap,
    aurum: Extension<Aurum>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let token = bearer(&headers)?;
    let Json(patch) = payload?;
    Ok(Json(aurum.update_user(token, patch).await?))
}

#[utoipa::path(
    get,
    path = "/user/{username}/groups",
    params(("username" = String, Path, description = "User whose memberships to list")),
    responses(
        (status = 200, description = "Groups the user belongs to, with roles.", body = [GroupWithRole]),
        (status = 401, description = "Not the caller and not a root admin.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn user_groups(
    Path(username): Path<String>,
    headers: HeaderMap,
    aurum: Extension<Aurum>,
) -> Result<Json<Vec<GroupWithRole>>, ApiError> {
    let token = bearer(&headers)?;
    Ok(Json(aurum.get_groups_for_user(token, &username).await?))
}
