/// PendingUser model and database operations
///
/// An unapproved registration awaiting an admin decision. Pending users
/// carry the same identity shape as active users plus a submission timestamp
/// and a mandatory referring admin, and are never authenticatable. A pending
/// record ends its life in exactly one of two ways: rejection (hard delete)
/// or approval (converted into a User, then deleted); it is never updated
/// in place.
///
/// The credential column already holds a hashed value: hashing happens once,
/// at pre-registration, and approval carries the stored credential through
/// unchanged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::password::Credential;
use crate::models::user::NotifyPreference;

/// Pending user model
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PendingUser {
    /// Unique pending-record ID
    pub id: Uuid,

    /// Tenant inherited from the referring admin
    pub tenant_id: Uuid,

    /// Email address (unique per tenant, also against active users)
    pub email: String,

    /// Caller-chosen identifier
    pub unique_id: String,

    /// Already-hashed credential; carried through approval without re-hashing
    #[serde(skip_serializing)]
    #[sqlx(try_from = "String")]
    pub credential: Credential,

    /// Display name
    pub display_name: String,

    /// Job position / title
    pub position: String,

    /// Free-text interests
    pub interests: String,

    /// Contact phone number
    pub phone: String,

    /// Notification delivery preference
    pub notification_preference: NotifyPreference,

    /// Admin whose referral this registration came through
    pub referring_admin_id: Uuid,

    /// When the registration was submitted
    pub submitted_at: DateTime<Utc>,
}

/// Input for creating a pending user
///
/// There is no role field: pending records always activate as members
/// unless an admin explicitly elevates them at approval time.
#[derive(Debug, Clone)]
pub struct CreatePendingUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub unique_id: String,
    pub credential: Credential,
    pub display_name: String,
    pub position: String,
    pub interests: String,
    pub phone: String,
    pub notification_preference: NotifyPreference,
    pub referring_admin_id: Uuid,
}

const PENDING_COLUMNS: &str = "id, tenant_id, email, unique_id, credential, display_name, \
     position, interests, phone, notification_preference, referring_admin_id, submitted_at";

impl PendingUser {
    /// Creates a pending registration
    ///
    /// # Errors
    ///
    /// Returns a unique-constraint violation when the email or unique ID
    /// collides with another pending record in the tenant.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        data: CreatePendingUser,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PendingUser>(&format!(
            r#"
            INSERT INTO pending_users (tenant_id, email, unique_id, credential, display_name,
                                       position, interests, phone, notification_preference, referring_admin_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PENDING_COLUMNS}
            "#
        ))
        .bind(data.tenant_id)
        .bind(data.email)
        .bind(data.unique_id)
        .bind(data.credential.as_str())
        .bind(data.display_name)
        .bind(data.position)
        .bind(data.interests)
        .bind(data.phone)
        .bind(data.notification_preference)
        .bind(data.referring_admin_id)
        .fetch_one(executor)
        .await
    }

    /// Finds a pending user by ID, with no tenant filter
    ///
    /// The lifecycle manager compares the record's tenant against the acting
    /// admin's tenant itself so it can distinguish "absent" from
    /// "cross-tenant".
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PendingUser>(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Checks whether an email or unique ID is taken by a pending record in a tenant
    pub async fn identity_taken_in_tenant(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        email: &str,
        unique_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM pending_users
                WHERE tenant_id = $1 AND (email = $2 OR unique_id = $3)
            )
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(unique_id)
        .fetch_one(executor)
        .await
    }

    /// Lists pending users of a tenant, oldest submission first
    pub async fn list_by_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PendingUser>(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_users WHERE tenant_id = $1 ORDER BY submitted_at ASC"
        ))
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Deletes a pending user within a tenant
    ///
    /// Used by both rejection and the final step of approval. Returns true
    /// when a row was removed; the losing side of a concurrent approval sees
    /// false here.
    pub async fn delete(
        executor: impl PgExecutor<'_>,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pending_users WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_user_serialization_omits_credential() {
        let pending = PendingUser {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "b@x.com".to_string(),
            unique_id: "U2".to_string(),
            credential: Credential::hash("secure123").unwrap(),
            display_name: "Grace".to_string(),
            position: String::new(),
            interests: String::new(),
            phone: String::new(),
            notification_preference: NotifyPreference::None,
            referring_admin_id: Uuid::new_v4(),
            submitted_at: Utc::now(),
        };

        let json = serde_json::to_value(&pending).expect("serialize");
        assert!(json.get("credential").is_none());
        assert_eq!(json["unique_id"], "U2");
    }
}
