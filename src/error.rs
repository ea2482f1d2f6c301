//! Error types with HTTP status code mapping.
//!
//! [`CompanionError`] is the central error type surfaced by the API. The
//! collaborator-level errors ([`ConnectionError`], [`TelemetryParseError`],
//! [`FetchError`]) are recovered inside the core and only reach clients as
//! state (`last_error`, connection state) or wrapped in a
//! [`CompanionError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "release v1.0.0 not found in firmware cache",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failure of the device link. Always recovered by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The handshake with the device failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The handshake did not complete within the connect timeout.
    #[error("handshake timed out after {timeout_ms} ms")]
    HandshakeTimeout {
        /// Connect timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The established link reported an error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The device closed the link.
    #[error("link closed by device")]
    Closed,

    /// No message arrived within the liveness window.
    #[error("no message for {timeout_ms} ms")]
    LivenessTimeout {
        /// Liveness window in milliseconds.
        timeout_ms: u64,
    },

    /// A command was issued while no link is up.
    #[error("device not connected")]
    NotConnected,
}

/// An inbound device message that could not be decoded. The message is
/// dropped; the link stays up.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryParseError {
    /// The payload is not valid JSON for a telemetry message.
    #[error("invalid telemetry payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is valid JSON but not an object.
    #[error("telemetry payload is not a JSON object")]
    NotAnObject,
}

/// Failure to retrieve a release list. Non-fatal: the previously cached
/// list stays available and the error is recorded on the cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Connection-level failure or unexpected HTTP status.
    #[error("network error: {message}")]
    Network {
        /// Underlying error text.
        message: String,
    },

    /// The release API refused the request because of rate limiting.
    #[error("rate limited by release API")]
    RateLimited {
        /// Seconds until the API accepts requests again, when known.
        retry_after_secs: Option<u64>,
    },

    /// The repository does not exist.
    #[error("repository not found: {repo}")]
    NotFound {
        /// `owner/name` of the repository.
        repo: String,
    },

    /// The request did not complete in time.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The response body could not be decoded.
    #[error("invalid release payload: {message}")]
    Decode {
        /// Decoder error text.
        message: String,
    },
}

impl FetchError {
    /// Returns `true` for [`FetchError::RateLimited`].
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                   |
/// |-----------|-----------------|-------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request               |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict  |
/// | 3000–3999 | Server          | 500 Internal Server Error     |
/// | 5000–5999 | Upstream        | 429 / 502 / 503 / 504         |
#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Resource key other than `firmware` or `app`.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// The requested release is not in the cache.
    #[error("release {tag} not found in {resource} cache")]
    ReleaseNotFound {
        /// Resource key.
        resource: String,
        /// Requested tag.
        tag: String,
    },

    /// The firmware selection was rejected.
    #[error("install not allowed: {0}")]
    InstallNotAllowed(String),

    /// A release fetch failed.
    #[error("release fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The device link failed.
    #[error("device connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A device message could not be decoded.
    #[error("telemetry error: {0}")]
    TelemetryParse(#[from] TelemetryParseError),

    /// Reading or writing a persisted file failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A configuration value could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompanionError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::UnknownResource(_) => 1002,
            Self::TelemetryParse(_) => 1003,
            Self::ReleaseNotFound { .. } => 2001,
            Self::InstallNotAllowed(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Config(_) => 3002,
            Self::Fetch(FetchError::RateLimited { .. }) => 5001,
            Self::Fetch(_) => 5002,
            Self::Connection(_) => 5003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnknownResource(_) | Self::TelemetryParse(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ReleaseNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InstallNotAllowed(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Fetch(FetchError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Self::Fetch(FetchError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Fetch(_) => StatusCode::BAD_GATEWAY,
            Self::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::Fetch(FetchError::RateLimited {
                retry_after_secs: Some(secs),
            }) => Some(format!("retry after {secs} s")),
            _ => None,
        }
    }
}

impl IntoResponse for CompanionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
