//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::service::ServiceError;

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    GatewayTimeout(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Log the detail and hand the client a generic message.
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Internal server error".into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::AlreadyExists => Self::conflict("User already exists"),
            ServiceError::UserNotFound => Self::not_found("User not found"),
            ServiceError::CodeIncorrect => Self::bad_request("Verification code is incorrect"),
            ServiceError::TokenNotFound => Self::unauthorized("Refresh token not found"),
            ServiceError::RefreshTokenExpired => Self::unauthorized("Refresh token expired"),
            ServiceError::BookNotFound => Self::not_found("Book not found"),
            ServiceError::Timeout => Self::GatewayTimeout("Request timed out".into()),
            ServiceError::Internal(detail) => Self::internal("Service failure", detail),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Parse a path identifier as a UUID.
pub fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    if id.is_empty() {
        return Err(ApiError::bad_request("ID cannot be empty"));
    }
    if id.len() > 36 {
        return Err(ApiError::bad_request("ID is too long"));
    }
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("Invalid ID format"))
}

/// Check that `value` has between `min` and `max` characters.
pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min {
        return Err(ApiError::bad_request(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    if len > max {
        return Err(ApiError::bad_request(format!(
            "{} cannot be longer than {} characters",
            field, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(e: ServiceError) -> StatusCode {
        ApiError::from(e).into_response().status()
    }

    #[test]
    fn test_service_error_statuses() {
        assert_eq!(status(ServiceError::AlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status(ServiceError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(ServiceError::CodeIncorrect), StatusCode::BAD_REQUEST);
        assert_eq!(status(ServiceError::TokenNotFound), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(ServiceError::RefreshTokenExpired),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status(ServiceError::BookNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(ServiceError::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status(ServiceError::Internal("disk on fire".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        match ApiError::from(ServiceError::Internal("disk on fire".into())) {
            ApiError::Internal(msg) => assert!(!msg.contains("disk")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert!(parse_id("").is_err());
        assert!(parse_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_length_counts_characters() {
        assert!(validate_length("Title", "", 1, 64).is_err());
        assert!(validate_length("Title", &"é".repeat(64), 1, 64).is_ok());
        assert!(validate_length("Title", &"a".repeat(65), 1, 64).is_err());
    }
}
