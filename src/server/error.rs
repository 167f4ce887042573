//! Mapping of crate errors onto HTTP responses.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::AppError;

/// Error returned by every handler. The body is `{"detail": "<message>"}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Config(_) => StatusCode::BAD_REQUEST,
            err if err.is_storage_failure() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self.0 {
            err if err.is_storage_failure() => format!("Error reading data files: {err}"),
            err => err.to_string(),
        };
        if status.is_server_error() {
            log::error!("{} {}", status.as_u16(), detail);
        } else {
            log::debug!("{} {}", status.as_u16(), detail);
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
