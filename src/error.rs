//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Services and repositories return this type; handlers let Axum convert it
/// into a response at the boundary.
///
/// # Error Categories
///
/// - **Client errors**: invalid input, missing credentials, missing permission,
///   unknown resources, uniqueness conflicts, rate limiting
/// - **Domain errors**: resource-specific failures such as a missing volume
/// - **Infrastructure errors**: database, object storage, unavailable dependencies
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bearer token is missing, unknown, revoked, or belongs to an inactive user or tenant.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid or missing credentials")]
    Unauthorized,

    /// The caller is authenticated but its role lacks the required permission.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("{0}")]
    Forbidden(String),

    /// Requested resource does not exist or doesn't belong to the caller's tenant.
    ///
    /// Returns HTTP 404 Not Found. The payload names the resource kind.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Requested shipping volume does not exist.
    ///
    /// Returns HTTP 404 Not Found with its own error code.
    #[error("Volume not found")]
    VolumeNotFound,

    /// Request body or parameters are invalid, or a state transition is not allowed.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    BadRequest(String),

    /// A uniqueness rule was violated.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Client exceeded its request quota; holds the seconds until the window resets.
    ///
    /// Returns HTTP 429 Too Many Requests.
    #[error("Rate limit exceeded")]
    RateLimited(u64),

    /// A downstream dependency is failing and its circuit is open.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Object storage failed while reading or writing a file.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a bad request with a formatted message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `BadRequest` → 400 Bad Request
/// - `Unauthorized` → 401 Unauthorized
/// - `Forbidden` → 403 Forbidden
/// - `NotFound`, `VolumeNotFound` → 404 Not Found
/// - `Conflict` → 409 Conflict
/// - `RateLimited` → 429 Too Many Requests (with `Retry-After`)
/// - `ServiceUnavailable` → 503 Service Unavailable
/// - `Database`, `Storage`, `Internal` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = match self {
            AppError::RateLimited(seconds) => Some(seconds),
            _ => None,
        };

        let (status, code, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "resource_not_found",
                self.to_string(),
            ),
            AppError::VolumeNotFound => {
                (StatusCode::NOT_FOUND, "volume_not_found", self.to_string())
            }
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::RateLimited(_) => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                self.to_string(),
            ),
            AppError::ServiceUnavailable(ref msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Storage(ref msg) | AppError::Internal(ref msg) => {
                tracing::error!(error = %msg, "Internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        let cases = [
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("Employee"), StatusCode::NOT_FOUND),
            (AppError::VolumeNotFound, StatusCode::NOT_FOUND),
            (AppError::bad_request("bad"), StatusCode::BAD_REQUEST),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::RateLimited(3), StatusCode::TOO_MANY_REQUESTS),
            (
                AppError::ServiceUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = AppError::RateLimited(42).into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );
    }

    #[test]
    fn not_found_message_names_resource() {
        assert_eq!(AppError::NotFound("Bin").to_string(), "Bin not found");
    }
}
