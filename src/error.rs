//! Error types for the Slack → Omi bridge.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for the bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Slack error: {0}")]
    Slack(#[from] SlackError),

    #[error("Omi error: {0}")]
    Omi(#[from] OmiError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Slack API errors.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("Slack request failed: {0}")]
    Http(String),

    /// Slack answered `ok: false` with a token-related error code.
    /// Routes react by dropping the session back to the linked state.
    #[error("Slack token expired or revoked ({code})")]
    TokenExpired { code: String },

    #[error("Slack API error: {code}")]
    Api { code: String },

    #[error("Unexpected Slack response shape: {0}")]
    InvalidResponse(String),

    #[error("File download failed: upstream returned {status}")]
    Download { status: u16 },
}

impl SlackError {
    /// Whether the session should lose its Slack token over this error.
    pub fn invalidates_token(&self) -> bool {
        matches!(self, SlackError::TokenExpired { .. })
    }
}

/// Omi memory API errors.
#[derive(Debug, thiserror::Error)]
pub enum OmiError {
    #[error("Omi request failed: {0}")]
    Http(String),

    #[error("Omi rejected the import: status {status}")]
    Rejected {
        status: u16,
        details: serde_json::Value,
    },
}

/// Error surfaced on the JSON routes as `{"error": ...}` with a 4xx/5xx status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated with Slack")]
    SlackAuthRequired,

    #[error("Not authenticated with Omi")]
    OmiAuthRequired,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Slack(#[from] SlackError),

    #[error("Failed to import messages to Omi")]
    Omi(#[source] OmiError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::SlackAuthRequired | ApiError::OmiAuthRequired => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Slack(SlackError::TokenExpired { .. }) => StatusCode::UNAUTHORIZED,
            ApiError::Slack(_) | ApiError::Omi(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // The Omi rejection carries the upstream body for debugging.
            ApiError::Omi(OmiError::Rejected { details, .. }) => serde_json::json!({
                "error": self.to_string(),
                "details": details,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
