// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::services::error::ServiceError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    // 401 Unauthorized
    Unauthorized(String),
    // 403 Forbidden
    Forbidden(String),
    // 404 Not Found
    NotFound(String),
    // 500 Internal Server Error
    InternalServerError(String),
    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::TenantNotFound
            | ServiceError::FolderNotFound
            | ServiceError::DeviceNotFound
            | ServiceError::TagNotFound
            | ServiceError::UserNotFound
            | ServiceError::RoleNotFound => ApiError::not_found(err.to_string()),

            ServiceError::TagNameTaken(_)
            | ServiceError::FolderNameTaken(_)
            | ServiceError::DeviceNameTaken(_)
            | ServiceError::TenantNameTaken(_)
            | ServiceError::UsernameTaken(_)
            | ServiceError::InvalidPassword
            | ServiceError::InvalidExpirationMinutes
            | ServiceError::InvalidHeartbeatInterval
            | ServiceError::InvalidOtp
            | ServiceError::ExpiredShareUrl
            | ServiceError::DeviceCredentialsNotConfigured => {
                ApiError::bad_request(err.to_string())
            }

            ServiceError::NotAuthenticated
            | ServiceError::InvalidCredentials
            | ServiceError::RefreshTokenNotValid => ApiError::unauthorized(err.to_string()),

            ServiceError::PermissionDenied => ApiError::forbidden(err.to_string()),

            ServiceError::Database(db_err) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("database error: {}", db_err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }

            ServiceError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authn_and_authz_map_to_distinct_statuses() {
        assert_eq!(ApiError::from(ServiceError::NotAuthenticated).status_code(), 401);
        assert_eq!(ApiError::from(ServiceError::PermissionDenied).status_code(), 403);
    }

    #[test]
    fn not_found_family_maps_to_404() {
        assert_eq!(ApiError::from(ServiceError::DeviceNotFound).status_code(), 404);
        assert_eq!(ApiError::from(ServiceError::TagNotFound).status_code(), 404);
    }

    #[test]
    fn name_taken_maps_to_400() {
        let err = ApiError::from(ServiceError::TagNameTaken("prod".into()));
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("prod"));
    }
}
