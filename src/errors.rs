use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid time format: {0}")]
    InvalidFormat(String),

    #[error("that time slot is no longer available, please pick another time")]
    SlotConflict,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("message delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("job already running: {0}")]
    JobAlreadyRunning(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AppError::SlotConflict => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::DeliveryFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::JobAlreadyRunning(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Time parse failures are a caller error at the API boundary.
        let message = match &self {
            AppError::InvalidFormat(detail) => format!("invalid argument: {detail}"),
            other => other.to_string(),
        };
        let code = match &self {
            AppError::SlotConflict => "slot_conflict",
            AppError::InvalidArgument(_) | AppError::InvalidFormat(_) => "invalid_argument",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::JobAlreadyRunning(_) => "job_already_running",
            AppError::DeliveryFailure(_) => "delivery_failure",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        };

        let body = serde_json::json!({ "success": false, "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}
