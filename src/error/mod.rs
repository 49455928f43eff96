use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::preview::PreviewError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Rejected input is a 400 (422 for the scheme), fetch failures are a 500
/// carrying the human-readable reason.
impl From<PreviewError> for AppError {
    fn from(e: PreviewError) -> Self {
        match e {
            PreviewError::InvalidUrl | PreviewError::BlockedHost | PreviewError::BlockedIp => {
                AppError::Validation(e.to_string())
            }
            PreviewError::UnsupportedScheme => AppError::Unprocessable(e.to_string()),
            PreviewError::NotHtml
            | PreviewError::TooLarge
            | PreviewError::Timeout
            | PreviewError::Resolve(_)
            | PreviewError::RedirectRefused(_)
            | PreviewError::Request(_) => AppError::Upstream(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message): (StatusCode, String) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".into(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
