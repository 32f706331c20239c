use crate::aurum::Error;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

/// Body of every error response.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Code")]
    pub code: String,
}

/// A kernel error on its way out through HTTP.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidInput(rejection.body_text()))
    }
}

impl ApiError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self(Error::InvalidInput(msg.into()))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::InvalidInput(_) | Error::WeakPassword => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotExists(_) => StatusCode::NOT_FOUND,
            Error::Exists(_) => StatusCode::CONFLICT,
            Error::Key(_) | Error::Store(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if self.0.is_internal() {
            error!("Request failed: {:#}", anyhow::Error::new(self.0));
            let body = ErrorResponse {
                message: "internal server error".to_string(),
                code: "Internal".to_string(),
            };
            return (status, Json(body)).into_response();
        }

        debug!(code = self.0.code(), "Request refused: {}", self.0);
        let body = ErrorResponse {
            message: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
