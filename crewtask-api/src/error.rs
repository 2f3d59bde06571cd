/// Error handling for the API server
///
/// A unified error type that maps onto HTTP responses. Handlers return
/// `ApiResult<T>`; domain errors from the lifecycle managers convert via
/// `From` so the status mapping lives in exactly one place:
///
/// | Domain error                                   | Status |
/// |------------------------------------------------|--------|
/// | Validation                                     | 422    |
/// | DuplicateIdentity / DuplicateAssignment /      |        |
/// | ConflictAlreadyExists                          | 409    |
/// | NotFound                                       | 404    |
/// | Forbidden / ForbiddenCrossTenant /             |        |
/// | SoleAdministratorProtected / CannotDeleteSelf  | 403    |
/// | InvalidCredentials / StaleToken / token errors | 401    |
/// | MissingTenantContext                           | 400    |
/// | Internal                                       | 500    |
///
/// Internal errors are logged with their detail and returned with a generic
/// body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crewtask_shared::auth::jwt::TokenError;
use crewtask_shared::error::LifecycleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - uniqueness violations
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "forbidden", "conflict")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log the detail; clients only see a generic message.
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert domain errors to API errors
impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match &err {
            LifecycleError::Validation(msg) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: "body".to_string(),
                    message: msg.clone(),
                }])
            }
            LifecycleError::DuplicateIdentity
            | LifecycleError::DuplicateAssignment
            | LifecycleError::ConflictAlreadyExists => ApiError::Conflict(err.to_string()),
            LifecycleError::NotFound(_) => ApiError::NotFound(err.to_string()),
            LifecycleError::Forbidden
            | LifecycleError::ForbiddenCrossTenant
            | LifecycleError::SoleAdministratorProtected
            | LifecycleError::CannotDeleteSelf => ApiError::Forbidden(err.to_string()),
            LifecycleError::InvalidCredentials | LifecycleError::StaleToken => {
                ApiError::Unauthorized(err.to_string())
            }
            LifecycleError::MissingTenantContext => ApiError::BadRequest(err.to_string()),
            LifecycleError::Internal(detail) => ApiError::InternalError(detail.to_string()),
        }
    }
}

/// Convert token errors to API errors
impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            other => ApiError::Unauthorized(format!("Invalid token: {other}")),
        }
    }
}

/// Convert raw storage errors that escape the lifecycle layer
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::from(LifecycleError::from_sqlx(err))
    }
}

/// Converts `validator` output into the structured 422 payload
pub fn validation_details(errors: validator::ValidationErrors) -> ApiError {
    let details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();

    ApiError::ValidationError(details)
}
