/// Task endpoints
///
/// - `GET /v1/tasks` - list tasks
/// - `GET /v1/tasks/:id` - fetch one task
/// - `POST /v1/tasks` - create a task (admin)
/// - `PUT /v1/tasks/:id` - update a task (admin)
/// - `DELETE /v1/tasks/:id` - delete a task and its assignments (admin)
///
/// When a task references a program, the program must belong to the
/// caller's organization and its name is snapshotted onto the task at
/// create/update time.

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use crewtask_shared::{
    auth::context::AuthContext,
    models::{
        program::Program,
        task::{CreateTask, Task},
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Task create/update request
#[derive(Debug, Deserialize, Validate)]
pub struct TaskRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(length(min = 1, message = "Required skills are required"))]
    pub required_skills: String,

    pub program_id: Option<Uuid>,

    pub deadline: Option<DateTime<Utc>>,
}

/// Resolves the program snapshot for a task payload
async fn resolve_program(
    state: &AppState,
    ctx: &AuthContext,
    program_id: Option<Uuid>,
) -> ApiResult<Option<String>> {
    match program_id {
        None => Ok(None),
        Some(id) => {
            let program = Program::find_in_tenant(&state.db, ctx.tenant_id, id)
                .await?
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "Program not found or does not belong to your organization".to_string(),
                    )
                })?;
            Ok(Some(program.name))
        }
    }
}

/// List the tasks of the caller's organization
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = Task::list_by_tenant(&state.db, ctx.tenant_id).await?;
    Ok(Json(tasks))
}

/// Fetch one task
pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    let task = Task::find_in_tenant(&state.db, ctx.tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;

    Ok(Json(task))
}

/// Create a task
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<TaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    ctx.require_admin()?;
    req.validate().map_err(validation_details)?;

    let program_name = resolve_program(&state, &ctx, req.program_id).await?;

    let task = Task::create(
        &state.db,
        CreateTask {
            tenant_id: ctx.tenant_id,
            title: req.title,
            description: req.description,
            required_skills: req.required_skills,
            program_id: req.program_id,
            program_name,
            deadline: req.deadline,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Update a task
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<TaskRequest>,
) -> ApiResult<Json<Task>> {
    ctx.require_admin()?;
    req.validate().map_err(validation_details)?;

    let program_name = resolve_program(&state, &ctx, req.program_id).await?;

    let task = Task::update(
        &state.db,
        ctx.tenant_id,
        id,
        CreateTask {
            tenant_id: ctx.tenant_id,
            title: req.title,
            description: req.description,
            required_skills: req.required_skills,
            program_id: req.program_id,
            program_name,
            deadline: req.deadline,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;

    Ok(Json(task))
}

/// Delete a task
///
/// Assignments bound to the task are removed by the schema cascade.
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.require_admin()?;

    let deleted = Task::delete(&state.db, ctx.tenant_id, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("task not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
