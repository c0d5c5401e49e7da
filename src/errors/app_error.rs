use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::platform::PlatformError;
use crate::core::realtime::RealtimeError;

/// Errors surfaced by the dashboard API
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A feature that needs configuration which is absent
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Platform(e) => platform_status(e),
            AppError::Realtime(RealtimeError::Platform(e)) => platform_status(e),
            AppError::Realtime(RealtimeError::NotActive) => StatusCode::NOT_FOUND,
            AppError::Realtime(
                RealtimeError::InvalidCall(_) | RealtimeError::InvalidEndpoint(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Realtime(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Platform(e) | AppError::Realtime(RealtimeError::Platform(e)) => {
                platform_code(e)
            }
            AppError::Realtime(RealtimeError::NotActive) => "no_active_session",
            AppError::Realtime(RealtimeError::InvalidCall(_)) => "invalid_call",
            AppError::Realtime(RealtimeError::InvalidEndpoint(_)) => "invalid_endpoint",
            AppError::Realtime(_) => "realtime_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Unavailable(_) => "unavailable",
        }
    }
}

fn platform_status(error: &PlatformError) -> StatusCode {
    match error {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        PlatformError::Http { .. } | PlatformError::Transport(_) | PlatformError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
        PlatformError::UnsupportedOperation(_) => StatusCode::CONFLICT,
        PlatformError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PlatformError::InvalidConfiguration(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn platform_code(error: &PlatformError) -> &'static str {
    match error {
        e if e.is_not_found() => "not_found",
        PlatformError::Http { .. } => "platform_error",
        PlatformError::Transport(_) => "platform_unreachable",
        PlatformError::Decode(_) => "platform_decode_error",
        PlatformError::UnsupportedOperation(_) => "unsupported_operation",
        PlatformError::InvalidRequest(_) => "invalid_request",
        PlatformError::InvalidConfiguration(_) => "platform_not_configured",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let AppError::Platform(PlatformError::Http { status, .. }) = &self {
            body["upstreamStatus"] = json!(status);
        }

        (status, Json(body)).into_response()
    }
}
