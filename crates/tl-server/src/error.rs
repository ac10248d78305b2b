//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; any [`tl_core::Error`]
//! converts with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: tl_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: tl_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &tl_core::Error {
        &self.inner
    }

    /// Stable machine-readable code for the wrapped error.
    pub fn code(&self) -> &'static str {
        match &self.inner {
            tl_core::Error::NotFound { .. } => "not_found",
            tl_core::Error::Validation(_) => "validation_error",
            tl_core::Error::UnsupportedMedia(_) => "unsupported_media_type",
            tl_core::Error::TooLarge { .. } => "payload_too_large",
            tl_core::Error::Io { .. } => "io_error",
            tl_core::Error::Tool { .. } => "tool_error",
            tl_core::Error::Probe(_) => "probe_error",
            tl_core::Error::Processing { .. } => "processing_error",
            tl_core::Error::Internal(_) => "internal_error",
        }
    }
}

impl From<tl_core::Error> for AppError {
    fn from(e: tl_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        } else if self.inner.is_input_rejection() {
            tracing::info!(status = %status, error = %self.inner, "Upload rejected");
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(tl_core::Error::not_found("job", "abc"));
        assert_eq!(err.code(), "not_found");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unsupported_media_produces_415() {
        let err = AppError::new(tl_core::Error::UnsupportedMedia("text/plain".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn too_large_produces_413() {
        let err = AppError::new(tl_core::Error::TooLarge { size: 10, limit: 5 });
        assert_eq!(err.code(), "payload_too_large");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn tool_failure_produces_502() {
        let err = AppError::new(tl_core::Error::tool("ffmpeg", "exit code 1"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn with_request_id() {
        let err = AppError::new(tl_core::Error::Internal("oops".into()))
            .with_request_id("req-123".into());
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
    }
}
