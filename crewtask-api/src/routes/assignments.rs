/// Assignment endpoints
///
/// - `GET /v1/assignments` - admins see the organization, members their own
/// - `GET /v1/assignments/:id` - fetch one assignment
/// - `POST /v1/assignments` - propose a task to a person (admin)
/// - `PUT /v1/assignments/:id` - status transition / submission metadata
/// - `DELETE /v1/assignments/:id` - administrative hard delete
///
/// Who may cause which transition is decided by the assignment lifecycle
/// manager; these handlers only shape requests and responses.

use crate::{
    app::AppState,
    error::{validation_details, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use crewtask_shared::{
    auth::context::AuthContext,
    lifecycle::assignment::AssignmentInput,
    models::assignment::{Assignment, AssignmentChange, AssignmentStatus},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Assignment creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssignmentRequest {
    pub task_id: Uuid,

    pub person_id: Uuid,

    /// Why this person was chosen
    #[validate(length(max = 2000, message = "Justification must be at most 2000 characters"))]
    pub justification: Option<String>,

    /// Overrides the task's deadline when set
    pub deadline: Option<DateTime<Utc>>,
}

/// Assignment update request: a status write and/or submission metadata
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAssignmentRequest {
    pub status: Option<AssignmentStatus>,

    pub submission_date: Option<DateTime<Utc>>,

    pub delay_reason: Option<String>,
}

/// List assignments visible to the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let assignments = state.assignments.list(&ctx).await?;
    Ok(Json(assignments))
}

/// Fetch one assignment
pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state.assignments.get(&ctx, id).await?;
    Ok(Json(assignment))
}

/// Propose a task to a person
///
/// # Errors
///
/// - `403 Forbidden`: caller is not an admin
/// - `404 Not Found`: task or person outside the caller's organization
/// - `409 Conflict`: the pair is already assigned
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateAssignmentRequest>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    req.validate().map_err(validation_details)?;

    let assignment = state
        .assignments
        .create(
            &ctx,
            AssignmentInput {
                task_id: req.task_id,
                person_id: req.person_id,
                justification: req.justification.unwrap_or_default(),
                deadline: req.deadline,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Apply a status transition or submission metadata
///
/// Assignees move their own assignment; admins approve completion on
/// anyone's. Everything else is a 403.
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAssignmentRequest>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state
        .assignments
        .update(
            &ctx,
            id,
            AssignmentChange {
                status: req.status,
                submission_date: req.submission_date,
                delay_reason: req.delay_reason,
            },
        )
        .await?;

    Ok(Json(assignment))
}

/// Delete an assignment
///
/// An administrative override that bypasses the state machine.
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.assignments.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
