/// Assignment model and database operations
///
/// An assignment binds one task to one assignee within a tenant and tracks
/// the work through its lifecycle.
///
/// # State Machine
///
/// ```text
/// pending_acceptance → accepted_by_user | declined_by_user
///                    → submitted_on_time | submitted_late
///                    → completed_admin_approved   (terminal)
/// ```
///
/// Status writes are one-hop permissive: an authorized actor may set any
/// status their role permits directly, without chaining through the
/// intermediate states. Who may set what is decided by the assignment
/// lifecycle manager; this module only persists.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE assignments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     person_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     task_title VARCHAR(255) NOT NULL,
///     person_name VARCHAR(255) NOT NULL,
///     justification TEXT NOT NULL DEFAULT '',
///     status assignment_status NOT NULL DEFAULT 'pending_acceptance',
///     deadline TIMESTAMPTZ,
///     submission_date TIMESTAMPTZ,
///     delay_reason TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT assignments_task_person_per_tenant UNIQUE (tenant_id, task_id, person_id)
/// );
/// ```
///
/// `task_title` and `person_name` are point-in-time snapshots captured at
/// creation; later renames of the task or person do not touch them. The
/// composite unique constraint is what guarantees at most one assignment per
/// (task, person) pair per tenant under concurrent creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Lifecycle status of an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Proposed by an admin; waiting for the assignee's decision
    PendingAcceptance,

    /// Assignee accepted the work
    AcceptedByUser,

    /// Assignee declined the work
    DeclinedByUser,

    /// Work submitted before the deadline
    SubmittedOnTime,

    /// Work submitted after the deadline
    SubmittedLate,

    /// Admin approved the submitted work; terminal
    CompletedAdminApproved,
}

impl AssignmentStatus {
    /// Converts status to its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::PendingAcceptance => "pending_acceptance",
            AssignmentStatus::AcceptedByUser => "accepted_by_user",
            AssignmentStatus::DeclinedByUser => "declined_by_user",
            AssignmentStatus::SubmittedOnTime => "submitted_on_time",
            AssignmentStatus::SubmittedLate => "submitted_late",
            AssignmentStatus::CompletedAdminApproved => "completed_admin_approved",
        }
    }

    /// True when no further transitions are expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::CompletedAdminApproved)
    }

    /// Statuses an assignee may set on their own assignment
    pub fn settable_by_assignee(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::AcceptedByUser
                | AssignmentStatus::DeclinedByUser
                | AssignmentStatus::SubmittedOnTime
                | AssignmentStatus::SubmittedLate
        )
    }

    /// True for the two submission statuses
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::SubmittedOnTime | AssignmentStatus::SubmittedLate
        )
    }
}

/// Assignment model
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Assignment {
    /// Unique assignment ID
    pub id: Uuid,

    /// Tenant this assignment belongs to
    pub tenant_id: Uuid,

    /// Task being assigned
    pub task_id: Uuid,

    /// Assignee
    pub person_id: Uuid,

    /// Task title snapshot from creation time
    pub task_title: String,

    /// Assignee display-name snapshot from creation time
    pub person_name: String,

    /// Why this person was chosen for this task
    pub justification: String,

    /// Current lifecycle status
    pub status: AssignmentStatus,

    /// Assignment-specific deadline; defaulted from the task at creation
    pub deadline: Option<DateTime<Utc>>,

    /// When the assignee submitted their work
    pub submission_date: Option<DateTime<Utc>>,

    /// Assignee's explanation for a late submission
    pub delay_reason: Option<String>,

    /// When the assignment was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating an assignment
#[derive(Debug, Clone)]
pub struct CreateAssignment {
    pub tenant_id: Uuid,
    pub task_id: Uuid,
    pub person_id: Uuid,
    pub task_title: String,
    pub person_name: String,
    pub justification: String,
    pub deadline: Option<DateTime<Utc>>,
}

/// Status and submission-metadata changes to apply to an assignment
#[derive(Debug, Clone, Default)]
pub struct AssignmentChange {
    /// New status, if the status is changing
    pub status: Option<AssignmentStatus>,

    /// Submission timestamp set by the assignee
    pub submission_date: Option<DateTime<Utc>>,

    /// Late-submission explanation set by the assignee
    pub delay_reason: Option<String>,
}

impl AssignmentChange {
    /// True when nothing would be written
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.submission_date.is_none() && self.delay_reason.is_none()
    }
}

const ASSIGNMENT_COLUMNS: &str = "id, tenant_id, task_id, person_id, task_title, person_name, \
     justification, status, deadline, submission_date, delay_reason, created_at";

impl Assignment {
    /// Creates an assignment in `pending_acceptance`
    ///
    /// # Errors
    ///
    /// Returns a unique-constraint violation when the (task, person) pair is
    /// already assigned in the tenant; callers translate that into
    /// `DuplicateAssignment`.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        data: CreateAssignment,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO assignments (tenant_id, task_id, person_id, task_title, person_name, justification, deadline)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(data.tenant_id)
        .bind(data.task_id)
        .bind(data.person_id)
        .bind(data.task_title)
        .bind(data.person_name)
        .bind(data.justification)
        .bind(data.deadline)
        .fetch_one(executor)
        .await
    }

    /// Finds an assignment by ID within a tenant
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists all assignments of a tenant, newest first
    pub async fn list_by_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE tenant_id = $1 ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Lists one person's assignments within a tenant, newest first
    pub async fn list_by_person(
        pool: &PgPool,
        tenant_id: Uuid,
        person_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE tenant_id = $1 AND person_id = $2 ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .bind(person_id)
        .fetch_all(pool)
        .await
    }

    /// Applies a status / submission-metadata change
    ///
    /// Only present fields are written; authorization has already happened
    /// in the lifecycle manager by the time this runs. Returns None when the
    /// assignment does not exist in the tenant.
    pub async fn apply_change(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        change: AssignmentChange,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut sets: Vec<String> = Vec::new();
        let mut bind_count = 2;

        if change.status.is_some() {
            bind_count += 1;
            sets.push(format!("status = ${bind_count}"));
        }
        if change.submission_date.is_some() {
            bind_count += 1;
            sets.push(format!("submission_date = ${bind_count}"));
        }
        if change.delay_reason.is_some() {
            bind_count += 1;
            sets.push(format!("delay_reason = ${bind_count}"));
        }

        if sets.is_empty() {
            return Self::find_in_tenant(pool, tenant_id, id).await;
        }

        let query = format!(
            "UPDATE assignments SET {} WHERE id = $1 AND tenant_id = $2 RETURNING {ASSIGNMENT_COLUMNS}",
            sets.join(", ")
        );

        let mut q = sqlx::query_as::<_, Assignment>(&query).bind(id).bind(tenant_id);

        if let Some(status) = change.status {
            q = q.bind(status);
        }
        if let Some(submission_date) = change.submission_date {
            q = q.bind(submission_date);
        }
        if let Some(delay_reason) = change.delay_reason {
            q = q.bind(delay_reason);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes an assignment within a tenant
    ///
    /// An administrative override that bypasses the state machine entirely.
    /// Returns true when a row was removed.
    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
