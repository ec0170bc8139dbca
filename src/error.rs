//! Folio Relay Error Types
//!
//! One error type for the whole relay, with HTTP mapping for the axum layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for relay operations
#[derive(Debug, Error)]
pub enum FolioError {
    /// Configuration errors (empty key pool, unparsable values, bad files)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every key in the pool failed for a single dispatch
    #[error("All API keys exhausted after {attempts} attempt(s). Last error: {last_error}")]
    KeysExhausted { attempts: usize, last_error: String },

    /// Upstream answered 429 or a quota message
    #[error("Rate limited by upstream (status {status})")]
    UpstreamRateLimited { status: u16 },

    /// Upstream rejected the credential
    #[error("Authentication failed (status {status}). Check your API key.")]
    Auth { status: u16 },

    /// Upstream answered with another non-2xx status
    #[error("Upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    Request(String),

    /// Response parsing failed
    #[error("Response error: {0}")]
    Response(String),

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Client input rejected
    #[error("{0}")]
    Validation(String),

    /// Inbound request throttled by the local limiter
    #[error("Too many submissions. Connection throttled.")]
    TooManyRequests,

    /// Datastore collaborator failure
    #[error("Store error: {0}")]
    Store(String),

    /// Email collaborator failure
    #[error("Email delivery failed: {0}")]
    Email(String),

    /// The connection's outbound queue is closed or full
    #[error("Connection {0} is not accepting frames")]
    ConnectionClosed(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FolioError {
    /// Status code used when this error reaches the HTTP boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            FolioError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FolioError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            FolioError::KeysExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to a browser
    fn public_detail(&self) -> String {
        match self {
            FolioError::Validation(msg) => msg.clone(),
            FolioError::TooManyRequests => self.to_string(),
            FolioError::KeysExhausted { attempts, .. } => format!(
                "AI service unavailable: all API keys exhausted after {} attempt(s)",
                attempts
            ),
            _ => "Internal server error. Please try again later.".to_string(),
        }
    }
}

impl From<reqwest::Error> for FolioError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FolioError::Timeout(err.to_string())
        } else if err.is_connect() {
            FolioError::Request(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            FolioError::Response(format!("Failed to decode response: {}", err))
        } else {
            FolioError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(err: serde_json::Error) -> Self {
        FolioError::Response(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for FolioError {
    fn from(err: std::io::Error) -> Self {
        FolioError::Config(format!("IO error: {}", err))
    }
}

impl IntoResponse for FolioError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, Json(json!({ "detail": self.public_detail() }))).into_response()
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, FolioError>;
