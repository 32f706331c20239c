use crate::{api::error::ApiError, aurum::Aurum, models::PublicKeyResponse};
use axum::{extract::Extension, Json};

#[utoipa::path(
    get,
    path = "/pk",
    responses(
        (status = 200, description = "PEM of the token verification key.", body = PublicKeyResponse),
    ),
    tag = "tokens"
)]
pub async fn public_key(aurum: Extension<Aurum>) -> Result<Json<PublicKeyResponse>, ApiError> {
    Ok(Json(PublicKeyResponse {
        public_key: aurum.public_key_pem()?,
    }))
}
