/// User management endpoints
///
/// - `GET /v1/users` - list organization members (admin)
/// - `GET /v1/users/:id` - fetch one user (admin, or self)
/// - `PUT /v1/users/:id` - update a profile (admin, or self)
/// - `PUT /v1/users/:id/role` - change a role (admin; sole-admin protected)
/// - `DELETE /v1/users/:id` - delete a user (admin; never self)

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use crewtask_shared::{
    auth::context::AuthContext,
    lifecycle::identity::ProfileUpdate,
    models::user::{NotifyPreference, User, UserRole},
};
use serde::Deserialize;
use uuid::Uuid;

/// Profile update request
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub unique_id: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub position: Option<String>,
    pub interests: Option<String>,
    pub phone: Option<String>,
    pub notification_preference: Option<NotifyPreference>,
}

/// Role change request
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

/// List the users of the caller's organization
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    let users = state.identity.list_users(&ctx).await?;
    Ok(Json(users))
}

/// Fetch one user
pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let user = state.identity.get_user(&ctx, id).await?;
    Ok(Json(user))
}

/// Update a user's profile
///
/// Email and unique-ID changes re-validate organization-scoped uniqueness
/// exactly as at creation; a password change re-hashes through the
/// credential store.
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .identity
        .update_profile(
            &ctx,
            id,
            ProfileUpdate {
                email: req.email,
                unique_id: req.unique_id,
                password: req.password,
                display_name: req.display_name,
                position: req.position,
                interests: req.interests,
                phone: req.phone,
                notification_preference: req.notification_preference,
            },
        )
        .await?;

    Ok(Json(user))
}

/// Change a user's role
///
/// Demoting the last administrator of an organization fails with 403.
pub async fn change_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<User>> {
    let user = state.identity.change_role(&ctx, id, req.role).await?;
    Ok(Json(user))
}

/// Delete a user
///
/// Self-deletion and deleting the last administrator both fail with 403.
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.identity.delete_user(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
