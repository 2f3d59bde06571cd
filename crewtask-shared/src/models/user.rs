/// User model and database operations
///
/// An active, authenticatable account scoped to a single tenant. Users are
/// created either by registration (the bootstrap admin of a brand-new
/// tenant) or by approval of a pending user, and every query here except the
/// login lookup and the bootstrap uniqueness check is tenant-filtered.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     email CITEXT NOT NULL,
///     unique_id VARCHAR(64) NOT NULL,
///     credential TEXT NOT NULL,
///     role user_role NOT NULL DEFAULT 'member',
///     display_name VARCHAR(255) NOT NULL,
///     position VARCHAR(255) NOT NULL DEFAULT '',
///     interests TEXT NOT NULL DEFAULT '',
///     phone VARCHAR(32) NOT NULL DEFAULT '',
///     notification_preference notify_preference NOT NULL DEFAULT 'none',
///     referring_admin_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT users_email_per_tenant UNIQUE (tenant_id, email),
///     CONSTRAINT users_unique_id_per_tenant UNIQUE (tenant_id, unique_id)
/// );
/// ```
///
/// The composite unique constraints are what actually guarantee identity
/// uniqueness under concurrent registration; the lifecycle manager's
/// pre-checks only improve error messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::password::Credential;

/// Role of a user within their tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Manages members, tasks, programs, and assignments for the tenant
    Admin,

    /// Accepts, performs, and submits assigned work
    Member,
}

impl UserRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
        }
    }

    /// True for administrators
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// How a user prefers to be notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notify_preference", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotifyPreference {
    /// Deliver notifications by e-mail
    Email,

    /// Phone contact only; no e-mail delivery
    Phone,

    /// No notifications at all
    None,
}

impl NotifyPreference {
    /// Whether e-mail delivery is acceptable for this user
    pub fn accepts_email(&self) -> bool {
        matches!(self, NotifyPreference::Email)
    }
}

/// User model representing an active account
///
/// The credential is never serialized: success payloads omit the password by
/// construction, not by post-processing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Tenant this user belongs to
    pub tenant_id: Uuid,

    /// Email address (case-insensitive via CITEXT; unique per tenant)
    pub email: String,

    /// Caller-chosen identifier, unique per tenant
    pub unique_id: String,

    /// Hashed password credential; never leaves the server
    #[serde(skip_serializing)]
    #[sqlx(try_from = "String")]
    pub credential: Credential,

    /// Role within the tenant
    pub role: UserRole,

    /// Display name
    pub display_name: String,

    /// Job position / title
    pub position: String,

    /// Free-text interests, used by admins when matching tasks
    pub interests: String,

    /// Contact phone number
    pub phone: String,

    /// Notification delivery preference
    pub notification_preference: NotifyPreference,

    /// Admin whose referral brought this user in, if any
    pub referring_admin_id: Option<Uuid>,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub unique_id: String,
    pub credential: Credential,
    pub role: UserRole,
    pub display_name: String,
    pub position: String,
    pub interests: String,
    pub phone: String,
    pub notification_preference: NotifyPreference,
    pub referring_admin_id: Option<Uuid>,
}

/// Input for updating an existing user's profile
///
/// All fields are optional; only present fields are written. Email and
/// unique-ID changes go through the same tenant-scoped uniqueness
/// constraints as creation.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub unique_id: Option<String>,
    pub credential: Option<Credential>,
    pub display_name: Option<String>,
    pub position: Option<String>,
    pub interests: Option<String>,
    pub phone: Option<String>,
    pub notification_preference: Option<NotifyPreference>,
}

impl UpdateUser {
    /// True when no field would be written
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.unique_id.is_none()
            && self.credential.is_none()
            && self.display_name.is_none()
            && self.position.is_none()
            && self.interests.is_none()
            && self.phone.is_none()
            && self.notification_preference.is_none()
    }
}

const USER_COLUMNS: &str = "id, tenant_id, email, unique_id, credential, role, display_name, \
     position, interests, phone, notification_preference, referring_admin_id, created_at";

impl User {
    /// Creates a new user
    ///
    /// Takes any executor so it can participate in the tenant-bootstrap and
    /// pending-approval transactions.
    ///
    /// # Errors
    ///
    /// Returns a unique-constraint violation when the email or unique ID is
    /// already taken within the tenant; callers translate that into the
    /// matching domain error.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        data: CreateUser,
    ) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (tenant_id, email, unique_id, credential, role, display_name,
                               position, interests, phone, notification_preference, referring_admin_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.tenant_id)
        .bind(data.email)
        .bind(data.unique_id)
        .bind(data.credential.as_str())
        .bind(data.role)
        .bind(data.display_name)
        .bind(data.position)
        .bind(data.interests)
        .bind(data.phone)
        .bind(data.notification_preference)
        .bind(data.referring_admin_id)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID without a tenant filter
    ///
    /// Used only by the token-verification path, which compares the stored
    /// tenant against the token's claim itself.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by ID within a tenant
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by email with no tenant filter
    ///
    /// The login path resolves the account first and reads the tenant off
    /// the record it finds; CITEXT makes the match case-insensitive.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Checks whether an email or unique ID is taken anywhere
    ///
    /// Only the brand-new-admin bootstrap uses this: no tenant scope exists
    /// yet at that point, so the check is global.
    pub async fn identity_taken_globally(
        pool: &PgPool,
        email: &str,
        unique_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users WHERE email = $1 OR unique_id = $2
            )
            "#,
        )
        .bind(email)
        .bind(unique_id)
        .fetch_one(pool)
        .await
    }

    /// Checks whether an email or unique ID is taken within a tenant
    ///
    /// `exclude` skips one user ID so profile updates do not collide with
    /// the record being updated.
    pub async fn identity_taken_in_tenant(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        email: &str,
        unique_id: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE tenant_id = $1 AND (email = $2 OR unique_id = $3) AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(unique_id)
        .bind(exclude)
        .fetch_one(executor)
        .await
    }

    /// Lists all users in a tenant, oldest first
    pub async fn list_by_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 ORDER BY created_at ASC"
        ))
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Lists the administrators of a tenant
    pub async fn list_admins(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND role = 'admin' ORDER BY created_at ASC"
        ))
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Counts active administrators of a tenant
    pub async fn count_admins(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND role = 'admin'")
                .bind(tenant_id)
                .fetch_one(executor)
                .await?;

        Ok(count)
    }

    /// Locks the tenant's admin rows and returns their IDs
    ///
    /// Must run inside a transaction. Concurrent demote/delete requests
    /// against the same tenant serialize on these row locks, which is what
    /// keeps the admin count from ever being raced to zero.
    pub async fn lock_admin_ids(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM users WHERE tenant_id = $1 AND role = 'admin' ORDER BY id FOR UPDATE",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await
    }

    /// Updates profile fields on a user
    ///
    /// Only present fields are written. Returns the updated user, or None
    /// when the user does not exist in the tenant.
    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build a dynamic update statement from the present fields.
        let mut sets: Vec<String> = Vec::new();
        let mut bind_count = 2;

        let mut push = |sets: &mut Vec<String>, column: &str| {
            bind_count += 1;
            sets.push(format!("{column} = ${bind_count}"));
        };

        if data.email.is_some() {
            push(&mut sets, "email");
        }
        if data.unique_id.is_some() {
            push(&mut sets, "unique_id");
        }
        if data.credential.is_some() {
            push(&mut sets, "credential");
        }
        if data.display_name.is_some() {
            push(&mut sets, "display_name");
        }
        if data.position.is_some() {
            push(&mut sets, "position");
        }
        if data.interests.is_some() {
            push(&mut sets, "interests");
        }
        if data.phone.is_some() {
            push(&mut sets, "phone");
        }
        if data.notification_preference.is_some() {
            push(&mut sets, "notification_preference");
        }

        if sets.is_empty() {
            return Self::find_in_tenant(pool, tenant_id, id).await;
        }

        let query = format!(
            "UPDATE users SET {} WHERE id = $1 AND tenant_id = $2 RETURNING {USER_COLUMNS}",
            sets.join(", ")
        );

        let mut q = sqlx::query_as::<_, User>(&query).bind(id).bind(tenant_id);

        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(unique_id) = data.unique_id {
            q = q.bind(unique_id);
        }
        if let Some(credential) = data.credential {
            q = q.bind(credential.as_str().to_string());
        }
        if let Some(display_name) = data.display_name {
            q = q.bind(display_name);
        }
        if let Some(position) = data.position {
            q = q.bind(position);
        }
        if let Some(interests) = data.interests {
            q = q.bind(interests);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(preference) = data.notification_preference {
            q = q.bind(preference);
        }

        q.fetch_optional(pool).await
    }

    /// Changes a user's role within a tenant
    ///
    /// The sole-admin guard lives in the lifecycle manager, which calls this
    /// inside the transaction that holds the admin row locks.
    pub async fn update_role(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $3 WHERE id = $1 AND tenant_id = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(tenant_id)
        .bind(role)
        .fetch_optional(executor)
        .await
    }

    /// Deletes a user within a tenant
    ///
    /// Cascades to the user's assignments via the schema. Returns true when
    /// a row was removed.
    pub async fn delete(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
