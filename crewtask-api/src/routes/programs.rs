/// Program endpoints
///
/// - `GET /v1/programs` - list programs
/// - `POST /v1/programs` - create a program (admin)
/// - `DELETE /v1/programs/:id` - delete a program (admin)

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use crewtask_shared::{auth::context::AuthContext, models::program::Program};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Program creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProgramRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub description: Option<String>,
}

/// List the programs of the caller's organization
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Program>>> {
    let programs = Program::list_by_tenant(&state.db, ctx.tenant_id).await?;
    Ok(Json(programs))
}

/// Create a program
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateProgramRequest>,
) -> ApiResult<(StatusCode, Json<Program>)> {
    ctx.require_admin()?;
    req.validate().map_err(validation_details)?;

    let program = Program::create(
        &state.db,
        ctx.tenant_id,
        &req.name,
        req.description.as_deref().unwrap_or(""),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(program)))
}

/// Delete a program
///
/// Tasks keep their snapshotted program name; their program reference is
/// nulled by the schema.
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    ctx.require_admin()?;

    let deleted = Program::delete(&state.db, ctx.tenant_id, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("program not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
