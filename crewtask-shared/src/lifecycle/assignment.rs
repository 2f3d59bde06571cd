/// Assignment lifecycle manager
///
/// Orchestrates assignment creation, status transitions, and deletion, and
/// decides who may cause each transition:
///
/// - the assignee may move their own assignment into `accepted_by_user`,
///   `declined_by_user`, `submitted_on_time`, or `submitted_late`, and may
///   set the submission date and delay reason on their own record;
/// - an admin of the same tenant may set `completed_admin_approved` on
///   anyone's assignment, and may otherwise update an assignment only when
///   they are themselves the assignee;
/// - every other combination is `Forbidden`.
///
/// Status writes are one-hop permissive: any status the actor's role
/// permits is accepted directly, with no requirement to chain through the
/// intermediate states. Notification fan-out runs after the authoritative
/// write commits and can neither block nor fail the request.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::context::AuthContext;
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::assignment::{Assignment, AssignmentChange, AssignmentStatus, CreateAssignment};
use crate::models::task::Task;
use crate::models::user::{User, UserRole};
use crate::notify::{dispatch, Notification, NotificationKind, Notifier};

/// Input for creating an assignment
#[derive(Debug, Clone)]
pub struct AssignmentInput {
    pub task_id: Uuid,
    pub person_id: Uuid,
    pub justification: String,
    /// Overrides the task's deadline when set
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}

/// Decides whether an actor may apply a change to an assignment
///
/// Pure decision logic over (role, ownership, change) so the full matrix is
/// unit-testable without a database. `pending_acceptance` is the initial
/// state only; nobody writes it back.
pub fn authorize_change(
    role: UserRole,
    is_own: bool,
    change: &AssignmentChange,
) -> LifecycleResult<()> {
    // Submission metadata belongs to the assignee's own record.
    let touches_metadata = change.submission_date.is_some() || change.delay_reason.is_some();
    if touches_metadata && !is_own {
        return Err(LifecycleError::Forbidden);
    }

    match change.status {
        Some(AssignmentStatus::CompletedAdminApproved) => {
            if role.is_admin() {
                Ok(())
            } else {
                Err(LifecycleError::Forbidden)
            }
        }
        Some(status) if status.settable_by_assignee() => {
            if is_own {
                Ok(())
            } else {
                Err(LifecycleError::Forbidden)
            }
        }
        Some(_) => Err(LifecycleError::Forbidden),
        None => {
            if is_own {
                Ok(())
            } else {
                Err(LifecycleError::Forbidden)
            }
        }
    }
}

/// Selects the admins to notify about a member-driven status change
///
/// Prefers the assignee's referring admin when one is set, still active,
/// and not the actor; otherwise every other admin of the tenant with an
/// e-mail-compatible notification preference.
pub fn status_change_recipients(
    assignee: &User,
    actor_id: Uuid,
    admins: &[User],
) -> Vec<User> {
    if let Some(referrer_id) = assignee.referring_admin_id {
        if referrer_id != actor_id {
            if let Some(referrer) = admins.iter().find(|a| a.id == referrer_id) {
                return vec![referrer.clone()];
            }
        }
    }

    admins
        .iter()
        .filter(|admin| admin.id != actor_id && admin.notification_preference.accepts_email())
        .cloned()
        .collect()
}

/// The assignment lifecycle manager
pub struct AssignmentManager {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl AssignmentManager {
    /// Creates a manager over the given pool and notifier
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Creates an assignment (admin only)
    ///
    /// The task and person must resolve within the actor's tenant. The task
    /// title and person name are snapshotted onto the assignment, and the
    /// deadline falls back to the task's when not overridden. A second
    /// assignment of the same task to the same person fails
    /// `DuplicateAssignment` via the composite unique constraint.
    pub async fn create(
        &self,
        actor: &AuthContext,
        input: AssignmentInput,
    ) -> LifecycleResult<Assignment> {
        actor.require_admin()?;

        let task = Task::find_in_tenant(&self.db, actor.tenant_id, input.task_id)
            .await?
            .ok_or(LifecycleError::NotFound("task"))?;

        let person = User::find_in_tenant(&self.db, actor.tenant_id, input.person_id)
            .await?
            .ok_or(LifecycleError::NotFound("user"))?;

        let assignment = Assignment::create(
            &self.db,
            CreateAssignment {
                tenant_id: actor.tenant_id,
                task_id: task.id,
                person_id: person.id,
                task_title: task.title.clone(),
                person_name: person.display_name.clone(),
                justification: input.justification,
                deadline: input.deadline.or(task.deadline),
            },
        )
        .await?;

        info!(
            assignment_id = %assignment.id,
            task_id = %task.id,
            person_id = %person.id,
            "assignment created"
        );

        if person.notification_preference.accepts_email() {
            dispatch(
                &self.notifier,
                Notification::new(NotificationKind::TaskProposed, &person.email, &person.display_name)
                    .with_params(serde_json::json!({
                        "task_title": assignment.task_title,
                        "task_deadline": assignment.deadline.map(|d| d.to_rfc3339()),
                    })),
            );
        }

        Ok(assignment)
    }

    /// Applies a status transition or submission-metadata change
    ///
    /// Authorization runs against the stored assignment before anything is
    /// written; the notification fan-out runs after the write commits.
    pub async fn update(
        &self,
        actor: &AuthContext,
        assignment_id: Uuid,
        change: AssignmentChange,
    ) -> LifecycleResult<Assignment> {
        let assignment = Assignment::find_in_tenant(&self.db, actor.tenant_id, assignment_id)
            .await?
            .ok_or(LifecycleError::NotFound("assignment"))?;

        let is_own = assignment.person_id == actor.user_id;
        authorize_change(actor.role, is_own, &change)?;

        let new_status = change.status;

        let updated = Assignment::apply_change(&self.db, actor.tenant_id, assignment_id, change)
            .await?
            .ok_or(LifecycleError::NotFound("assignment"))?;

        if let Some(status) = new_status {
            info!(
                assignment_id = %updated.id,
                status = status.as_str(),
                "assignment status changed"
            );
            // The write is already committed; a fan-out failure is logged,
            // never surfaced to the caller.
            if let Err(err) = self.fan_out_status_change(actor, &updated, status).await {
                tracing::warn!(
                    assignment_id = %updated.id,
                    error = %err,
                    "status-change notification fan-out failed"
                );
            }
        }

        Ok(updated)
    }

    /// Deletes an assignment (admin only)
    ///
    /// An administrative override outside the normal lifecycle: the state
    /// machine is bypassed entirely and no notifications are sent.
    pub async fn delete(&self, actor: &AuthContext, assignment_id: Uuid) -> LifecycleResult<()> {
        actor.require_admin()?;

        let deleted = Assignment::delete(&self.db, actor.tenant_id, assignment_id).await?;
        if !deleted {
            return Err(LifecycleError::NotFound("assignment"));
        }

        info!(assignment_id = %assignment_id, "assignment deleted");
        Ok(())
    }

    /// Lists assignments: admins see the whole tenant, members their own
    pub async fn list(&self, actor: &AuthContext) -> LifecycleResult<Vec<Assignment>> {
        let assignments = if actor.is_admin() {
            Assignment::list_by_tenant(&self.db, actor.tenant_id).await?
        } else {
            Assignment::list_by_person(&self.db, actor.tenant_id, actor.user_id).await?
        };

        Ok(assignments)
    }

    /// Fetches one assignment; members may only read their own
    pub async fn get(&self, actor: &AuthContext, assignment_id: Uuid) -> LifecycleResult<Assignment> {
        let assignment = Assignment::find_in_tenant(&self.db, actor.tenant_id, assignment_id)
            .await?
            .ok_or(LifecycleError::NotFound("assignment"))?;

        if !actor.is_admin() && assignment.person_id != actor.user_id {
            return Err(LifecycleError::Forbidden);
        }

        Ok(assignment)
    }

    /// Sends the post-transition notifications
    ///
    /// Completion notifies the assignee; the member-driven statuses notify
    /// an admin. Each dispatch is fire-and-forget with per-recipient
    /// logging, so one bad address never affects the others.
    async fn fan_out_status_change(
        &self,
        actor: &AuthContext,
        assignment: &Assignment,
        status: AssignmentStatus,
    ) -> LifecycleResult<()> {
        let assignee = match User::find_in_tenant(&self.db, assignment.tenant_id, assignment.person_id)
            .await?
        {
            Some(user) => user,
            // Assignee deleted between write and fan-out; nothing to send.
            None => return Ok(()),
        };

        if status == AssignmentStatus::CompletedAdminApproved {
            dispatch(
                &self.notifier,
                Notification::new(
                    NotificationKind::TaskCompletionApproved,
                    &assignee.email,
                    &assignee.display_name,
                )
                .with_params(serde_json::json!({ "task_title": assignment.task_title })),
            );
            return Ok(());
        }

        if status.settable_by_assignee() {
            let admins = User::list_admins(&self.db, assignment.tenant_id).await?;
            for recipient in status_change_recipients(&assignee, actor.user_id, &admins) {
                dispatch(
                    &self.notifier,
                    Notification::new(
                        NotificationKind::TaskStatusChanged,
                        &recipient.email,
                        &recipient.display_name,
                    )
                    .with_params(serde_json::json!({
                        "user_name": assignee.display_name,
                        "task_title": assignment.task_title,
                        "user_action": status.as_str(),
                    })),
                );
            }
        }

        Ok(())
    }
}
