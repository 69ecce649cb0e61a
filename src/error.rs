use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ineligible state: {0}")]
    IneligibleState(String),

    #[error("offer already accepted by another rider")]
    AlreadyAccepted,

    #[error("offer no longer available")]
    NotAvailable,

    #[error("deadline passed, offer expired")]
    Expired,

    #[error("invalid verification code")]
    InvalidCode,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable tag, also used as the metrics outcome label.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::IneligibleState(_) => "ineligible_state",
            AppError::AlreadyAccepted => "already_accepted",
            AppError::NotAvailable => "not_available",
            AppError::Expired => "expired",
            AppError::InvalidCode => "invalid_code",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // Losing the acceptance race is an expected outcome, reported
            // with a specific message rather than a generic failure.
            AppError::IneligibleState(_) | AppError::AlreadyAccepted | AppError::NotAvailable => {
                StatusCode::CONFLICT
            }
            AppError::Expired => StatusCode::GONE,
            AppError::InvalidCode => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
