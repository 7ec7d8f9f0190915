//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`. The JSON body is
//! `{"error", "code", "request_id"}`; the request id is filled in by
//! [`request_id_middleware`](super::request_id::request_id_middleware).

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::conversion::ConversionError;

/// Message and code of an error response, kept in the response extensions.
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub code: &'static str,
}

impl ErrorDetails {
    /// JSON body for this error.
    pub fn body(&self, request_id: Option<&str>) -> Value {
        json!({
            "error": self.message,
            "code": self.code,
            "request_id": request_id,
        })
    }
}

/// Error returned by API handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    details: ErrorDetails,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            details: ErrorDetails {
                message: message.into(),
                code,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn with_status(status: u16, code: &'static str, message: String) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, code, message)
    }
}

impl From<hlsrelay_common::Error> for AppError {
    fn from(e: hlsrelay_common::Error) -> Self {
        Self::with_status(e.http_status(), e.code(), e.to_string())
    }
}

impl From<ConversionError> for AppError {
    fn from(e: ConversionError) -> Self {
        Self::with_status(e.http_status(), e.code(), e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", e.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                error = %self.details.message,
                "Server error in API handler"
            );
        }

        let mut response = (self.status, Json(self.details.body(None))).into_response();
        response.extensions_mut().insert(self.details);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsrelay_common::{Error, StreamId};

    #[test]
    fn not_found_produces_404() {
        let response = AppError::from(Error::not_found("overlay", "abc")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_identifier_produces_400() {
        let response = AppError::from(Error::invalid_identifier("abc")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conversion_failures_produce_500() {
        let err = ConversionError::ProcessExited {
            stream_id: StreamId::new(),
            exit: "exit status: 1".to_string(),
        };
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let details = response.extensions().get::<ErrorDetails>().unwrap();
        assert_eq!(details.code, "process_exited");
    }

    #[test]
    fn body_shape() {
        let details = ErrorDetails {
            message: "RTSP URL is required".to_string(),
            code: "validation_error",
        };
        let body = details.body(Some("req-1"));
        assert_eq!(body["error"], "RTSP URL is required");
        assert_eq!(body["code"], "validation_error");
        assert_eq!(body["request_id"], "req-1");
    }
}
