use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Video error: {0}")]
    VideoError(String),

    #[error("Video device lost [{device}]: {reason}")]
    VideoDeviceLost { device: String, reason: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Why a stream session ended
///
/// Every variant is terminal for the session and none is retried inside the
/// loop; the client reconnecting is the unit of retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The frame source produced no frame (hardware fault, timeout, device lost)
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Re-encoding a raw frame to JPEG failed
    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    /// Writing to the client failed, usually an ordinary disconnect
    #[error("Sink write failed: {0}")]
    Sink(String),
}

impl StreamError {
    /// Sink failures are the normal way a stream ends and are not faults
    pub fn is_disconnect(&self) -> bool {
        matches!(self, StreamError::Sink(_))
    }
}

impl From<AppError> for StreamError {
    fn from(err: AppError) -> Self {
        StreamError::Capture(err.to_string())
    }
}

/// JSON body of a failed request
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ServiceUnavailable(_)
            | AppError::VideoError(_)
            | AppError::VideoDeviceLost { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        tracing::error!(
            error_type = std::any::type_name_of_val(&self),
            error_message = %body.message,
            "Request failed"
        );

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sink_errors_are_disconnects() {
        assert!(StreamError::Sink("closed".into()).is_disconnect());
        assert!(!StreamError::Capture("timeout".into()).is_disconnect());
        assert!(!StreamError::Encode("bad size".into()).is_disconnect());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ServiceUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::VideoError("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
