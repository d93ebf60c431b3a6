//! Error types for the hub server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("missing or invalid authentication token")]
    Unauthorized,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the hub's WebSocket client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("handshake failed: {message}")]
    Handshake { message: String },

    #[error("connection closed")]
    Closed,
}

impl HubError {
    pub fn config(message: impl Into<String>) -> Self {
        HubError::Config {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        HubError::InvalidRequest {
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            HubError::Unauthorized => StatusCode::UNAUTHORIZED,
            HubError::Forbidden => StatusCode::FORBIDDEN,
            HubError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            HubError::Config { .. } | HubError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            HubError::Config { .. } => "config",
            HubError::Unauthorized => "unauthorized",
            HubError::Forbidden => "forbidden",
            HubError::InvalidRequest { .. } => "invalid_request",
            HubError::Io(_) => "io",
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HubError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(HubError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            HubError::invalid_request("empty event").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_display() {
        let err = HubError::config("HUB_JWT_SECRET is not set");
        assert_eq!(err.to_string(), "configuration error: HUB_JWT_SECRET is not set");
    }
}
