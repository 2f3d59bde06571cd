/// Authenticated request context and the live-record re-check
///
/// A verified token is a claim about the past: it asserts what the subject's
/// role and tenant were at issuance. Before any authorization decision, the
/// claims are re-checked against the live user record; a user who was
/// demoted, promoted, or moved to another tenant after issuance fails with
/// `StaleToken` instead of being honored. The HTTP layer runs this once per
/// request and injects the resulting [`AuthContext`] into request
/// extensions.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::jwt::Claims;
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::user::{User, UserRole};

/// Identity of the actor behind a request, verified against the live record
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Tenant the user belongs to
    pub tenant_id: Uuid,

    /// Role the user currently holds
    pub role: UserRole,
}

impl AuthContext {
    /// True for administrators
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fails with `Forbidden` unless the actor is an admin
    pub fn require_admin(&self) -> LifecycleResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden)
        }
    }
}

/// Re-checks verified claims against the live user record
///
/// # Errors
///
/// - `StaleToken` when the user no longer exists, or the stored tenant or
///   role differs from the claims
/// - `Internal` on storage failure
pub async fn resolve_context(pool: &PgPool, claims: &Claims) -> LifecycleResult<AuthContext> {
    let user = User::find_by_id(pool, claims.sub)
        .await?
        .ok_or(LifecycleError::StaleToken)?;

    if user.tenant_id != claims.tenant_id || user.role != claims.role {
        return Err(LifecycleError::StaleToken);
    }

    Ok(AuthContext {
        user_id: user.id,
        tenant_id: user.tenant_id,
        role: user.role,
    })
}
