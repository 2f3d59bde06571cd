/// Task model and database operations
///
/// A task is a unit of work an admin defines and later assigns to members.
/// From the assignment lifecycle's point of view a task is read-only input:
/// its title and deadline are consumed at assignment-creation time and the
/// title is snapshotted onto the assignment.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL,
///     required_skills TEXT NOT NULL,
///     program_id UUID REFERENCES programs(id) ON DELETE SET NULL,
///     program_name VARCHAR(255),
///     deadline TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `program_name` is a snapshot captured when the task is created or
/// updated, not a live join against the programs table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Task model
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Tenant this task belongs to
    pub tenant_id: Uuid,

    /// Task title
    pub title: String,

    /// What the work involves
    pub description: String,

    /// Skills an assignee should bring
    pub required_skills: String,

    /// Program the task belongs to, if any
    pub program_id: Option<Uuid>,

    /// Program name snapshot from create/update time
    pub program_name: Option<String>,

    /// When the work is due; assignments fall back to this
    pub deadline: Option<DateTime<Utc>>,

    /// When the task was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub tenant_id: Uuid,
    pub title: String,
    pub description: String,
    pub required_skills: String,
    pub program_id: Option<Uuid>,
    pub program_name: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

const TASK_COLUMNS: &str =
    "id, tenant_id, title, description, required_skills, program_id, program_name, deadline, created_at";

impl Task {
    /// Creates a new task
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (tenant_id, title, description, required_skills, program_id, program_name, deadline)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(data.tenant_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.required_skills)
        .bind(data.program_id)
        .bind(data.program_name)
        .bind(data.deadline)
        .fetch_one(pool)
        .await
    }

    /// Finds a task by ID within a tenant
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists tasks of a tenant, newest first
    pub async fn list_by_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE tenant_id = $1 ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Replaces the mutable fields of a task
    ///
    /// The full field set is written on every update, matching how admins
    /// edit tasks as a whole form. Returns None when the task does not exist
    /// in the tenant.
    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: CreateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET title = $3, description = $4, required_skills = $5,
                program_id = $6, program_name = $7, deadline = $8
            WHERE id = $1 AND tenant_id = $2
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tenant_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.required_skills)
        .bind(data.program_id)
        .bind(data.program_name)
        .bind(data.deadline)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a task within a tenant
    ///
    /// Assignments bound to the task are removed by the schema cascade.
    /// Returns true when a row was removed.
    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
