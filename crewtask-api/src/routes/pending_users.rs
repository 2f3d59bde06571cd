/// Pending-user endpoints
///
/// - `POST /v1/auth/pre-register` - public, referral-gated self-service
///   pre-registration
/// - `GET /v1/pending-users` - list the review queue (admin)
/// - `POST /v1/pending-users/:id/approve` - activate a pending user (admin)
/// - `DELETE /v1/pending-users/:id` - reject a pending user (admin)

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use crewtask_shared::{
    auth::{context::AuthContext, password},
    lifecycle::identity::{ApprovalOverrides, PendingRegistrationInput},
    models::{
        pending_user::PendingUser,
        user::{NotifyPreference, User, UserRole},
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Pre-registration request
///
/// There is no role field: pending registrations always activate as
/// members unless an admin elevates them at approval time.
#[derive(Debug, Deserialize, Validate)]
pub struct PreRegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 64, message = "Unique ID must be 1-64 characters"))]
    pub unique_id: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,

    /// The admin whose referral link brought the submitter here
    pub referring_admin_id: Uuid,

    pub position: Option<String>,
    pub interests: Option<String>,
    pub phone: Option<String>,
    pub notification_preference: Option<NotifyPreference>,
}

/// Approval request: optional profile overrides and a requested final role
#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    /// Requested role; `admin` is downgraded to `member` when the
    /// organization already has an administrator
    pub role: Option<UserRole>,

    pub display_name: Option<String>,
    pub position: Option<String>,
    pub interests: Option<String>,
    pub phone: Option<String>,
    pub notification_preference: Option<NotifyPreference>,
}

/// Submit a pre-registration under an admin's referral
///
/// # Errors
///
/// - `404 Not Found`: the referring admin does not exist
/// - `409 Conflict`: email or unique ID taken by an active or pending user
/// - `422 Unprocessable Entity`: validation failed
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<PreRegisterRequest>,
) -> ApiResult<(StatusCode, Json<PendingUser>)> {
    req.validate().map_err(validation_details)?;

    password::validate_password_strength(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![crate::error::ValidationErrorDetail {
            field: "password".to_string(),
            message: e,
        }])
    })?;

    let pending = state
        .identity
        .submit_pending(PendingRegistrationInput {
            email: req.email,
            unique_id: req.unique_id,
            password: req.password,
            display_name: req.display_name,
            referring_admin_id: req.referring_admin_id,
            position: req.position.unwrap_or_default(),
            interests: req.interests.unwrap_or_default(),
            phone: req.phone.unwrap_or_default(),
            notification_preference: req.notification_preference.unwrap_or(NotifyPreference::None),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(pending)))
}

/// List the pending users of the caller's organization
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<PendingUser>>> {
    let pending = state.identity.list_pending(&ctx).await?;
    Ok(Json(pending))
}

/// Approve a pending user
///
/// Idempotent in effect: of two concurrent approvals of the same record,
/// one receives the activated user and the other a 404 or 409.
pub async fn approve(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state
        .identity
        .approve_pending(
            &ctx,
            id,
            ApprovalOverrides {
                requested_role: req.role,
                display_name: req.display_name,
                position: req.position,
                interests: req.interests,
                phone: req.phone,
                notification_preference: req.notification_preference,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Reject (delete) a pending user
pub async fn reject(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.identity.reject_pending(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
