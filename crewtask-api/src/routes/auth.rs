/// Authentication endpoints
///
/// - `POST /v1/auth/register` - register a user; an `admin` role request
///   bootstraps a brand-new organization
/// - `POST /v1/auth/login` - authenticate and receive tokens
/// - `POST /v1/auth/refresh` - exchange a refresh token for a new access token
///
/// Pre-registration under a referral lives in
/// [`crate::routes::pending_users::submit`].

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use crewtask_shared::{
    auth::{jwt, password},
    lifecycle::identity::RegisterInput,
    models::user::{NotifyPreference, User, UserRole},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Caller-chosen identifier, unique within the organization
    #[validate(length(min = 1, max = 64, message = "Unique ID must be 1-64 characters"))]
    pub unique_id: String,

    /// Password (validated for strength below)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Display name
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,

    /// Requested role; `admin` creates a new organization
    pub role: UserRole,

    /// Organization name when bootstrapping a new tenant
    #[validate(length(max = 100, message = "Company name must be at most 100 characters"))]
    pub company_name: Option<String>,

    /// Explicit tenant for an admin-created member
    pub tenant_id: Option<Uuid>,

    /// Referring admin whose tenant a member registration inherits
    pub referring_admin_id: Option<Uuid>,

    /// Optional profile fields
    pub position: Option<String>,
    pub interests: Option<String>,
    pub phone: Option<String>,
    pub notification_preference: Option<NotifyPreference>,
}

/// Register / login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// The authenticated user (credential omitted)
    pub user: User,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<(String, String)> {
    let access = jwt::Claims::new(user.id, user.tenant_id, user.role, jwt::TokenType::Access);
    let refresh = jwt::Claims::new(user.id, user.tenant_id, user.role, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh, state.jwt_secret())?;

    Ok((access_token, refresh_token))
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "a@x.com",
///   "unique_id": "U1",
///   "password": "Secure123!",
///   "display_name": "Ada",
///   "role": "admin",
///   "company_name": "Acme"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: member registration with no resolvable organization
/// - `409 Conflict`: email or unique ID already taken
/// - `422 Unprocessable Entity`: validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate().map_err(validation_details)?;

    password::validate_password_strength(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![crate::error::ValidationErrorDetail {
            field: "password".to_string(),
            message: e,
        }])
    })?;

    let user = state
        .identity
        .register(RegisterInput {
            email: req.email,
            unique_id: req.unique_id,
            password: req.password,
            display_name: req.display_name,
            requested_role: req.role,
            company_name: req.company_name,
            tenant_id: req.tenant_id,
            referring_admin_id: req.referring_admin_id,
            position: req.position.unwrap_or_default(),
            interests: req.interests.unwrap_or_default(),
            phone: req.phone.unwrap_or_default(),
            notification_preference: req.notification_preference.unwrap_or(NotifyPreference::None),
        })
        .await?;

    let (access_token, refresh_token) = issue_tokens(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            access_token,
            refresh_token,
        }),
    ))
}

/// Login endpoint
///
/// Authenticates by email and password and returns tokens asserting the
/// user's identity, role, and organization. Unknown email and wrong
/// password are indistinguishable in the response.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate().map_err(validation_details)?;

    let user = state.identity.authenticate(&req.email, &req.password).await?;

    let (access_token, refresh_token) = issue_tokens(&state, &user)?;

    Ok(Json(AuthResponse {
        user,
        access_token,
        refresh_token,
    }))
}

/// Token refresh endpoint
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}
