//! Group and membership endpoints.
//!
//! `/group/{group}/{username}` is the membership resource: `GET` is the public
//! access check, `POST` joins (always at role `user` unless the caller is a
//! group admin), `PUT` sets or revokes access, `DELETE` removes.

use super::bearer;
use crate::{
    api::error::{ApiError, ErrorResponse},
    aurum::Aurum,
    models::{AccessStatus, Group, Role},
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

#[utoipa::path(
    get,
    path = "/groups",
    responses(
        (status = 200, description = "All groups.", body = [Group]),
    ),
    tag = "groups"
)]
pub async fn list_groups(aurum: Extension<Aurum>) -> Result<Json<Vec<Group>>, ApiError> {
    Ok(Json(aurum.get_groups().await?))
}

#[utoipa::path(
    post,
    path = "/group",
    request_body = Group,
    responses(
        (status = 201, description = "Group created; the caller is its admin.", body = Group),
        (status = 401, description = "Caller is not a root admin.", body = ErrorResponse),
        (status = 409, description = "Group already exists.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn add_group(
    headers: HeaderMap,
    aurum: Extension<Aurum>,
    payload: Result<Json<Group>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer(&headers)?;
    let Json(group) = payload?;
    let created = aurum.add_group(token, group).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    delete,
    path = "/group/{group}",
    params(("group" = String, Path, description = "Group name, case-insensitive")),
    responses(
        (status = 204, description = "Group and its memberships removed."),
        (status = 401, description = "Caller is not a group admin, or the group is the root group.", body = ErrorResponse),
        (status = 404, description = "No such group.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn remove_group(
    Path(group): Path<String>,
    headers: HeaderMap,
    aurum: Extension<Aurum>,
) -> Result<StatusCode, ApiError> {
    aurum.remove_group(bearer(&headers)?, &group).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/group/{group}/{username}",
    params(
        ("group" = String, Path, description = "Group name, case-insensitive"),
        ("username" = String, Path, description = "User to check"),
    ),
    responses(
        (status = 200, description = "Whether the user holds a role in the group.", body = AccessStatus),
    ),
    tag = "groups"
)]
pub async fn get_access(
    Path((group, username)): Path<(String, String)>,
    aurum: Extension<Aurum>,
) -> Result<Json<AccessStatus>, ApiError> {
    Ok(Json(aurum.get_access(&username, &group).await?))
}

#[utoipa::path(
    post,
    path = "/group/{group}/{username}",
    params(
        ("group" = String, Path, description = "Group name, case-insensitive"),
        ("username" = String, Path, description = "User to add"),
    ),
    responses(
        (status = 201, description = "Membership created."),
        (status = 401, description = "Not allowed to add this user.", body = ErrorResponse),
        (status = 404, description = "No such group.", body = ErrorResponse),
        (status = 409, description = "Already a member.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn add_user_to_group(
    Path((group, username)): Path<(String, String)>,
    headers: HeaderMap,
    aurum: Extension<Aurum>,
) -> Result<StatusCode, ApiError> {
    aurum
        .add_user_to_group(bearer(&headers)?, &username, &group, Role::User)
        .await?;
    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    put,
    path = "/group/{group}/{username}",
    request_body = AccessStatus,
    params(
        ("group" = String, Path, description = "Group name, case-insensitive"),
        ("username" = String, Path, description = "User whose access to set"),
    ),
    responses(
        (status = 200, description = "Access after the change.", body = AccessStatus),
        (status = 400, description = "Body does not match the path.", body = ErrorResponse),
        (status = 401, description = "Caller is not a group admin.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn set_access(
    Path((group, username)): Path<(String, String)>,
    headers: HeaderMap,
    aurum: Extension<Aurum>,
    payload: Result<Json<AccessStatus>, JsonRejection>,
) -> Result<Json<AccessStatus>, ApiError> {
    let token = bearer(&headers)?;
    let Json(status) = payload?;
    if status.group.to_lowercase() != group.to_lowercase() || status.username != username {
        return Err(ApiError::invalid("body does not match the request path"));
    }

    if status.allowed {
        let role = status.role.unwrap_or(Role::User);
        aurum.set_access(token, &group, &username, role).await?;
    } else {
        aurum.remove_user_from_group(token, &username, &group).await?;
    }

    Ok(Json(aurum.get_access(&username, &group).await?))
}

#[utoipa::path(
    delete,
    path = "/group/{group}/{username}",
    params(
        ("group" = String, Path, description = "Group name, case-insensitive"),
        ("username" = String, Path, description = "User to remove"),
    ),
    responses(
        (status = 204, description = "Membership removed."),
        (status = 400, description = "Root group membership cannot be removed.", body = ErrorResponse),
        (status = 401, description = "Not a group admin and not the user themselves.", body = ErrorResponse),
        (status = 404, description = "No such membership.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn remove_user_from_group(
    Path((group, username)): Path<(String, String)>,
    headers: HeaderMap,
    aurum: Extension<Aurum>,
) -> Result<StatusCode, ApiError> {
    aurum
        .remove_user_from_group(bearer(&headers)?, &username, &group)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
