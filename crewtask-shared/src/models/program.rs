/// Program model and database operations
///
/// A program groups related tasks within a tenant. Tasks snapshot the
/// program name at create/update time, so renaming a program does not
/// rewrite existing tasks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Program model
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Program {
    /// Unique program ID
    pub id: Uuid,

    /// Tenant this program belongs to
    pub tenant_id: Uuid,

    /// Program name
    pub name: String,

    /// Free-text description
    pub description: String,

    /// When the program was created
    pub created_at: DateTime<Utc>,
}

impl Program {
    /// Creates a new program
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        name: &str,
        description: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Program>(
            r#"
            INSERT INTO programs (tenant_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, tenant_id, name, description, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await
    }

    /// Finds a program by ID within a tenant
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Program>(
            "SELECT id, tenant_id, name, description, created_at FROM programs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists programs of a tenant, newest first
    pub async fn list_by_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Program>(
            "SELECT id, tenant_id, name, description, created_at FROM programs WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Deletes a program within a tenant
    ///
    /// Tasks referencing the program keep their snapshotted name; their
    /// program_id is nulled by the schema.
    pub async fn delete(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM programs WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
