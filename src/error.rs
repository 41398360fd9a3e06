// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::database::StoreError;
use crate::device::DeviceError;
use crate::identity::IdentityError;
use crate::services::ServiceError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::TooManyRequests(_) => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
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

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotAuthorized(msg) => ApiError::unauthorized(msg),
            IdentityError::UserNotFound => ApiError::not_found("User not found"),
            IdentityError::UserNotConfirmed => {
                ApiError::forbidden("User is not confirmed. Please verify your email first.")
            }
            IdentityError::UsernameExists => ApiError::bad_request("User already exists"),
            IdentityError::CodeMismatch => ApiError::bad_request("Invalid verification code"),
            IdentityError::ExpiredCode => ApiError::bad_request("Verification code has expired"),
            IdentityError::InvalidPassword(msg) => ApiError::bad_request(msg),
            IdentityError::InvalidParameter(msg) => ApiError::bad_request(msg),
            limited @ IdentityError::LimitExceeded => ApiError::too_many_requests(limited.to_string()),
            other @ (IdentityError::GroupNotFound(_) | IdentityError::Upstream(_) | IdentityError::Store(_)) => {
                tracing::error!("Identity provider error: {}", other);
                ApiError::internal_server_error(other.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConditionFailed { .. } => ApiError::conflict(err.to_string()),
            other => {
                tracing::error!("Store error: {}", other);
                ApiError::internal_server_error(other.to_string())
            }
        }
    }
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        tracing::error!("Device registry error: {}", err);
        ApiError::internal_server_error(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::bad_request(msg),
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::AccessDenied(denied) => ApiError::forbidden(denied.to_string()),
            ServiceError::Partial(msg) => ApiError::internal_server_error(msg),
            ServiceError::Identity(e) => e.into(),
            ServiceError::Store(e) => e.into(),
            ServiceError::Device(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AccessDenied;

    #[test]
    fn identity_errors_map_to_statuses() {
        assert_eq!(ApiError::from(IdentityError::NotAuthorized("x".into())).status_code(), 401);
        assert_eq!(ApiError::from(IdentityError::UserNotFound).status_code(), 404);
        assert_eq!(ApiError::from(IdentityError::UserNotConfirmed).status_code(), 403);
        assert_eq!(ApiError::from(IdentityError::CodeMismatch).status_code(), 400);
        assert_eq!(ApiError::from(IdentityError::LimitExceeded).status_code(), 429);
        assert_eq!(ApiError::from(IdentityError::Upstream("down".into())).status_code(), 500);
    }

    #[test]
    fn service_errors_map_to_statuses() {
        assert_eq!(ApiError::from(ServiceError::Conflict("x".into())).status_code(), 409);
        let denied = ApiError::from(ServiceError::AccessDenied(AccessDenied::ManagerNotAssigned));
        assert_eq!(denied.status_code(), 403);
        assert_eq!(denied.message(), "Access denied. Manager account not assigned to any office.");
    }

    #[test]
    fn error_body_has_flag_message_and_code() {
        let body = ApiError::not_found("Office not found").to_json();
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Office not found");
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
