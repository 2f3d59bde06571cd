/// Identity lifecycle manager
///
/// Orchestrates registration, the pending-approval workflow, role changes,
/// user deletion, and authentication, enforcing the identity invariants:
///
/// - email and unique ID are unique within a tenant, across active AND
///   pending users;
/// - a tenant with users always retains at least one administrator (the
///   sole-admin invariant), and admins never delete themselves;
/// - a password is hashed exactly once, at registration or
///   pre-registration; approval carries the stored credential through
///   unchanged;
/// - login failures are indistinguishable between unknown email and wrong
///   password.
///
/// Uniqueness pre-checks here exist to produce precise error messages; the
/// composite unique constraints in the schema are what actually hold under
/// concurrent requests, and constraint violations are translated back into
/// the same domain errors.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::context::AuthContext;
use crate::auth::password::{verify_dummy, Credential};
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::pending_user::{CreatePendingUser, PendingUser};
use crate::models::tenant::Tenant;
use crate::models::user::{CreateUser, NotifyPreference, UpdateUser, User, UserRole};
use crate::notify::{dispatch, Notification, NotificationKind, Notifier};

/// Input for registration
///
/// A requested role of `admin` bootstraps a brand-new tenant; `member`
/// requires a resolvable tenant (explicit, or via a referring admin).
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub unique_id: String,
    pub password: String,
    pub display_name: String,
    pub requested_role: UserRole,
    /// Organization name for a new tenant (admin bootstrap only)
    pub company_name: Option<String>,
    /// Explicit tenant for an admin-created member
    pub tenant_id: Option<Uuid>,
    /// Referring admin whose tenant a member registration inherits
    pub referring_admin_id: Option<Uuid>,
    pub position: String,
    pub interests: String,
    pub phone: String,
    pub notification_preference: NotifyPreference,
}

/// Input for a self-service pre-registration under a referral
#[derive(Debug, Clone)]
pub struct PendingRegistrationInput {
    pub email: String,
    pub unique_id: String,
    pub password: String,
    pub display_name: String,
    /// Mandatory: determines the tenant and who reviews the request
    pub referring_admin_id: Uuid,
    pub position: String,
    pub interests: String,
    pub phone: String,
    pub notification_preference: NotifyPreference,
}

/// Optional overrides an admin may apply while approving a pending user
#[derive(Debug, Clone, Default)]
pub struct ApprovalOverrides {
    /// Requested final role; `admin` is silently downgraded to `member`
    /// when the tenant already has an active admin
    pub requested_role: Option<UserRole>,
    pub display_name: Option<String>,
    pub position: Option<String>,
    pub interests: Option<String>,
    pub phone: Option<String>,
    pub notification_preference: Option<NotifyPreference>,
}

/// Profile changes to an active user
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub unique_id: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub position: Option<String>,
    pub interests: Option<String>,
    pub phone: Option<String>,
    pub notification_preference: Option<NotifyPreference>,
}

/// Resolves the role a pending user activates with
///
/// The "first admin only" policy is enforced by demotion, not rejection: a
/// request for `admin` in a tenant that already has one succeeds as
/// `member`, so approval always succeeds when the identity is free.
pub fn resolve_final_role(requested: Option<UserRole>, active_admin_count: i64) -> UserRole {
    match requested {
        Some(UserRole::Admin) if active_admin_count == 0 => UserRole::Admin,
        _ => UserRole::Member,
    }
}

/// The identity lifecycle manager
///
/// Holds the connection pool and the notification channel; stateless
/// otherwise, so one instance is shared across all request handlers.
pub struct IdentityManager {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl IdentityManager {
    /// Creates a manager over the given pool and notifier
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Registers a user
    ///
    /// With a requested role of `admin` this is the tenant-creation
    /// operation: a fresh tenant and its sole administrator come into
    /// existence in one transaction. Since no tenant scope exists yet, the
    /// identity collision check is global.
    ///
    /// With `member`, a tenant must be resolvable from the input or a
    /// referring admin; otherwise the registration fails with
    /// `MissingTenantContext` rather than defaulting silently.
    pub async fn register(&self, input: RegisterInput) -> LifecycleResult<User> {
        validate_identity_fields(&input.email, &input.unique_id, &input.password, &input.display_name)?;

        let credential = Credential::hash(&input.password)
            .map_err(|e| LifecycleError::Internal(anyhow::Error::new(e)))?;

        let user = match input.requested_role {
            UserRole::Admin => self.register_admin_bootstrap(&input, credential).await?,
            UserRole::Member => self.register_member(&input, credential).await?,
        };

        info!(user_id = %user.id, tenant_id = %user.tenant_id, role = user.role.as_str(), "user registered");

        dispatch(
            &self.notifier,
            Notification::new(NotificationKind::WelcomeRegistration, &user.email, &user.display_name)
                .with_params(serde_json::json!({
                    "user_role": user.role.as_str(),
                    "company_name": input.company_name.clone().unwrap_or_default(),
                })),
        );

        Ok(user)
    }

    async fn register_admin_bootstrap(
        &self,
        input: &RegisterInput,
        credential: Credential,
    ) -> LifecycleResult<User> {
        if User::identity_taken_globally(&self.db, &input.email, &input.unique_id).await? {
            return Err(LifecycleError::DuplicateIdentity);
        }

        let tenant_name = input
            .company_name
            .clone()
            .unwrap_or_else(|| format!("{}'s Organization", input.display_name));

        // Tenant and bootstrap admin are one atomic unit: no window exists
        // in which the tenant has users but no administrator.
        let mut tx = self.db.begin().await?;

        let tenant = Tenant::create(&mut *tx, &tenant_name).await?;

        let user = User::create(
            &mut *tx,
            CreateUser {
                tenant_id: tenant.id,
                email: input.email.clone(),
                unique_id: input.unique_id.clone(),
                credential,
                role: UserRole::Admin,
                display_name: input.display_name.clone(),
                position: input.position.clone(),
                interests: input.interests.clone(),
                phone: input.phone.clone(),
                notification_preference: input.notification_preference,
                referring_admin_id: None,
            },
        )
        .await?;

        tx.commit().await?;

        info!(tenant_id = %tenant.id, name = %tenant.name, "tenant created");

        Ok(user)
    }

    async fn register_member(
        &self,
        input: &RegisterInput,
        credential: Credential,
    ) -> LifecycleResult<User> {
        // Resolve the tenant: explicit, or inherited from a referring admin.
        let tenant_id = match (input.tenant_id, input.referring_admin_id) {
            (Some(tenant_id), _) => tenant_id,
            (None, Some(referrer_id)) => {
                let referrer = User::find_by_id(&self.db, referrer_id)
                    .await?
                    .ok_or(LifecycleError::NotFound("referring admin"))?;
                if !referrer.role.is_admin() {
                    return Err(LifecycleError::Validation(
                        "referring user is not an administrator".into(),
                    ));
                }
                referrer.tenant_id
            }
            (None, None) => return Err(LifecycleError::MissingTenantContext),
        };

        if User::identity_taken_in_tenant(&self.db, tenant_id, &input.email, &input.unique_id, None)
            .await?
        {
            return Err(LifecycleError::DuplicateIdentity);
        }

        let user = User::create(
            &self.db,
            CreateUser {
                tenant_id,
                email: input.email.clone(),
                unique_id: input.unique_id.clone(),
                credential,
                role: UserRole::Member,
                display_name: input.display_name.clone(),
                position: input.position.clone(),
                interests: input.interests.clone(),
                phone: input.phone.clone(),
                notification_preference: input.notification_preference,
                referring_admin_id: input.referring_admin_id,
            },
        )
        .await?;

        Ok(user)
    }

    /// Submits a self-service pre-registration under an admin's referral
    ///
    /// The new record's tenant is inherited from the referrer, never
    /// self-assigned, and the stored role is always `member`. Uniqueness is
    /// checked against both active and pending users in that tenant. On
    /// success both the submitter and the referring admin are notified;
    /// delivery failure never rolls back the write.
    pub async fn submit_pending(
        &self,
        input: PendingRegistrationInput,
    ) -> LifecycleResult<PendingUser> {
        validate_identity_fields(&input.email, &input.unique_id, &input.password, &input.display_name)?;

        let referrer = User::find_by_id(&self.db, input.referring_admin_id)
            .await?
            .ok_or(LifecycleError::NotFound("referring admin"))?;

        if !referrer.role.is_admin() {
            return Err(LifecycleError::Validation(
                "referring user is not an administrator".into(),
            ));
        }

        let tenant_id = referrer.tenant_id;

        let taken_active =
            User::identity_taken_in_tenant(&self.db, tenant_id, &input.email, &input.unique_id, None)
                .await?;
        let taken_pending =
            PendingUser::identity_taken_in_tenant(&self.db, tenant_id, &input.email, &input.unique_id)
                .await?;

        if taken_active || taken_pending {
            return Err(LifecycleError::DuplicateIdentity);
        }

        let credential = Credential::hash(&input.password)
            .map_err(|e| LifecycleError::Internal(anyhow::Error::new(e)))?;

        let pending = PendingUser::create(
            &self.db,
            CreatePendingUser {
                tenant_id,
                email: input.email.clone(),
                unique_id: input.unique_id.clone(),
                credential,
                display_name: input.display_name.clone(),
                position: input.position.clone(),
                interests: input.interests.clone(),
                phone: input.phone.clone(),
                notification_preference: input.notification_preference,
                referring_admin_id: referrer.id,
            },
        )
        .await?;

        info!(pending_id = %pending.id, tenant_id = %tenant_id, "pre-registration submitted");

        dispatch(
            &self.notifier,
            Notification::new(
                NotificationKind::PreRegistrationSubmitted,
                &pending.email,
                &pending.display_name,
            )
            .with_params(serde_json::json!({ "admin_name": referrer.display_name })),
        );
        dispatch(
            &self.notifier,
            Notification::new(
                NotificationKind::PreRegistrationReceived,
                &referrer.email,
                &referrer.display_name,
            )
            .with_params(serde_json::json!({
                "pending_user_name": pending.display_name,
                "pending_user_unique_id": pending.unique_id,
            })),
        );

        Ok(pending)
    }

    /// Approves a pending user, converting it into an active user
    ///
    /// Cross-tenant approval is forbidden. A collision with an active user
    /// discovered here (a concurrent approval won) deletes the pending
    /// record and fails `ConflictAlreadyExists`, so one of two racing
    /// approvals succeeds and the other sees a conflict or `NotFound`. The
    /// stored credential is carried through without re-hashing.
    pub async fn approve_pending(
        &self,
        actor: &AuthContext,
        pending_id: Uuid,
        overrides: ApprovalOverrides,
    ) -> LifecycleResult<User> {
        actor.require_admin()?;

        let pending = PendingUser::find_by_id(&self.db, pending_id)
            .await?
            .ok_or(LifecycleError::NotFound("pending user"))?;

        if pending.tenant_id != actor.tenant_id {
            return Err(LifecycleError::ForbiddenCrossTenant);
        }

        // Re-check against active users: another approval path may have
        // activated this identity since the record was submitted.
        if User::identity_taken_in_tenant(
            &self.db,
            pending.tenant_id,
            &pending.email,
            &pending.unique_id,
            None,
        )
        .await?
        {
            PendingUser::delete(&self.db, pending.tenant_id, pending.id).await?;
            return Err(LifecycleError::ConflictAlreadyExists);
        }

        let admin_count = User::count_admins(&self.db, pending.tenant_id).await?;
        let role = resolve_final_role(overrides.requested_role, admin_count);

        let create = CreateUser {
            tenant_id: pending.tenant_id,
            email: pending.email.clone(),
            unique_id: pending.unique_id.clone(),
            // Already hashed at pre-registration; passes through unchanged.
            credential: pending.credential.clone(),
            role,
            display_name: overrides.display_name.unwrap_or_else(|| pending.display_name.clone()),
            position: overrides.position.unwrap_or_else(|| pending.position.clone()),
            interests: overrides.interests.unwrap_or_else(|| pending.interests.clone()),
            phone: overrides.phone.unwrap_or_else(|| pending.phone.clone()),
            notification_preference: overrides
                .notification_preference
                .unwrap_or(pending.notification_preference),
            referring_admin_id: Some(pending.referring_admin_id),
        };

        let mut tx = self.db.begin().await?;

        let user = match User::create(&mut *tx, create).await {
            Ok(user) => user,
            Err(err) => {
                let domain_err = LifecycleError::from_sqlx(err);
                tx.rollback().await.ok();
                if domain_err.is_duplicate() {
                    // Lost the race between the pre-check and the insert.
                    PendingUser::delete(&self.db, pending.tenant_id, pending.id).await?;
                    return Err(LifecycleError::ConflictAlreadyExists);
                }
                return Err(domain_err);
            }
        };

        PendingUser::delete(&mut *tx, pending.tenant_id, pending.id).await?;

        tx.commit().await?;

        info!(
            user_id = %user.id,
            tenant_id = %user.tenant_id,
            role = user.role.as_str(),
            "pending user approved"
        );

        dispatch(
            &self.notifier,
            Notification::new(NotificationKind::AccountActivated, &user.email, &user.display_name)
                .with_params(serde_json::json!({})),
        );

        Ok(user)
    }

    /// Rejects (hard-deletes) a pending user
    ///
    /// No cascading effects; a record outside the actor's tenant reads as
    /// absent.
    pub async fn reject_pending(&self, actor: &AuthContext, pending_id: Uuid) -> LifecycleResult<()> {
        actor.require_admin()?;

        let deleted = PendingUser::delete(&self.db, actor.tenant_id, pending_id).await?;
        if !deleted {
            return Err(LifecycleError::NotFound("pending user"));
        }

        info!(pending_id = %pending_id, "pre-registration rejected");
        Ok(())
    }

    /// Lists the pending users of the actor's tenant
    pub async fn list_pending(&self, actor: &AuthContext) -> LifecycleResult<Vec<PendingUser>> {
        actor.require_admin()?;
        Ok(PendingUser::list_by_tenant(&self.db, actor.tenant_id).await?)
    }

    /// Changes a user's role within the actor's tenant
    ///
    /// Demoting the last administrator fails `SoleAdministratorProtected`.
    /// The admin rows are locked inside the transaction so two concurrent
    /// demotions cannot both observe a count of two and proceed.
    pub async fn change_role(
        &self,
        actor: &AuthContext,
        user_id: Uuid,
        new_role: UserRole,
    ) -> LifecycleResult<User> {
        actor.require_admin()?;

        let mut tx = self.db.begin().await?;

        let admin_ids = User::lock_admin_ids(&mut *tx, actor.tenant_id).await?;

        let target_is_admin = admin_ids.contains(&user_id);
        if target_is_admin && new_role == UserRole::Member && admin_ids.len() == 1 {
            return Err(LifecycleError::SoleAdministratorProtected);
        }

        let updated = User::update_role(&mut *tx, actor.tenant_id, user_id, new_role)
            .await?
            .ok_or(LifecycleError::NotFound("user"))?;

        tx.commit().await?;

        info!(user_id = %user_id, role = new_role.as_str(), "role changed");
        Ok(updated)
    }

    /// Deletes a user from the actor's tenant
    ///
    /// Self-deletion is always rejected, independent of the admin count;
    /// deleting the last administrator fails `SoleAdministratorProtected`
    /// under the same locking discipline as demotion.
    pub async fn delete_user(&self, actor: &AuthContext, user_id: Uuid) -> LifecycleResult<()> {
        actor.require_admin()?;

        if user_id == actor.user_id {
            return Err(LifecycleError::CannotDeleteSelf);
        }

        let mut tx = self.db.begin().await?;

        let admin_ids = User::lock_admin_ids(&mut *tx, actor.tenant_id).await?;
        if admin_ids.contains(&user_id) && admin_ids.len() == 1 {
            return Err(LifecycleError::SoleAdministratorProtected);
        }

        let deleted = User::delete(&mut *tx, actor.tenant_id, user_id).await?;
        if !deleted {
            return Err(LifecycleError::NotFound("user"));
        }

        tx.commit().await?;

        info!(user_id = %user_id, "user deleted");
        Ok(())
    }

    /// Updates a user's profile
    ///
    /// Members may update only themselves; admins may update anyone in
    /// their tenant. Email and unique-ID changes re-validate tenant-scoped
    /// uniqueness exactly as at creation; a password change re-hashes
    /// through the credential store.
    pub async fn update_profile(
        &self,
        actor: &AuthContext,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> LifecycleResult<User> {
        if !actor.is_admin() && actor.user_id != user_id {
            return Err(LifecycleError::Forbidden);
        }

        let current = User::find_in_tenant(&self.db, actor.tenant_id, user_id)
            .await?
            .ok_or(LifecycleError::NotFound("user"))?;

        if update.email.is_some() || update.unique_id.is_some() {
            let email = update.email.as_deref().unwrap_or(&current.email);
            let unique_id = update.unique_id.as_deref().unwrap_or(&current.unique_id);

            if User::identity_taken_in_tenant(
                &self.db,
                actor.tenant_id,
                email,
                unique_id,
                Some(user_id),
            )
            .await?
            {
                return Err(LifecycleError::DuplicateIdentity);
            }
        }

        let credential = match update.password.as_deref() {
            Some(password) => Some(
                Credential::hash(password)
                    .map_err(|e| LifecycleError::Internal(anyhow::Error::new(e)))?,
            ),
            None => None,
        };

        let updated = User::update(
            &self.db,
            actor.tenant_id,
            user_id,
            UpdateUser {
                email: update.email,
                unique_id: update.unique_id,
                credential,
                display_name: update.display_name,
                position: update.position,
                interests: update.interests,
                phone: update.phone,
                notification_preference: update.notification_preference,
            },
        )
        .await?
        .ok_or(LifecycleError::NotFound("user"))?;

        Ok(updated)
    }

    /// Lists the users of the actor's tenant
    pub async fn list_users(&self, actor: &AuthContext) -> LifecycleResult<Vec<User>> {
        actor.require_admin()?;
        Ok(User::list_by_tenant(&self.db, actor.tenant_id).await?)
    }

    /// Fetches one user from the actor's tenant
    pub async fn get_user(&self, actor: &AuthContext, user_id: Uuid) -> LifecycleResult<User> {
        if !actor.is_admin() && actor.user_id != user_id {
            return Err(LifecycleError::Forbidden);
        }

        User::find_in_tenant(&self.db, actor.tenant_id, user_id)
            .await?
            .ok_or(LifecycleError::NotFound("user"))
    }

    /// Authenticates a user by email and password
    ///
    /// The lookup runs with no tenant filter; the tenant is read off the
    /// record that matches. Unknown email and wrong password both return the
    /// same `InvalidCredentials`, and the unknown-email branch burns a dummy
    /// verification so the two paths cost the same.
    pub async fn authenticate(&self, email: &str, password: &str) -> LifecycleResult<User> {
        let user = match User::find_by_email(&self.db, email).await? {
            Some(user) => user,
            None => {
                verify_dummy(password);
                return Err(LifecycleError::InvalidCredentials);
            }
        };

        let valid = user
            .credential
            .verify(password)
            .map_err(|e| LifecycleError::Internal(anyhow::Error::new(e)))?;

        if !valid {
            return Err(LifecycleError::InvalidCredentials);
        }

        Ok(user)
    }
}

fn validate_identity_fields(
    email: &str,
    unique_id: &str,
    password: &str,
    display_name: &str,
) -> LifecycleResult<()> {
    if email.trim().is_empty() {
        return Err(LifecycleError::Validation("email is required".into()));
    }
    if unique_id.trim().is_empty() {
        return Err(LifecycleError::Validation("unique ID is required".into()));
    }
    if password.is_empty() {
        return Err(LifecycleError::Validation("password is required".into()));
    }
    if display_name.trim().is_empty() {
        return Err(LifecycleError::Validation("display name is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_final_role_first_admin_allowed() {
        assert_eq!(resolve_final_role(Some(UserRole::Admin), 0), UserRole::Admin);
    }

    #[test]
    fn test_resolve_final_role_downgrades_when_admin_exists() {
        // The "first admin only" policy demotes instead of rejecting.
        assert_eq!(resolve_final_role(Some(UserRole::Admin), 1), UserRole::Member);
        assert_eq!(resolve_final_role(Some(UserRole::Admin), 3), UserRole::Member);
    }

    #[test]
    fn test_resolve_final_role_defaults_to_member() {
        assert_eq!(resolve_final_role(None, 0), UserRole::Member);
        assert_eq!(resolve_final_role(Some(UserRole::Member), 0), UserRole::Member);
        assert_eq!(resolve_final_role(Some(UserRole::Member), 5), UserRole::Member);
    }

    #[test]
    fn test_validate_identity_fields() {
        assert!(validate_identity_fields("a@x.com", "U1", "pw", "Ada").is_ok());
        assert!(validate_identity_fields("", "U1", "pw", "Ada").is_err());
        assert!(validate_identity_fields("a@x.com", " ", "pw", "Ada").is_err());
        assert!(validate_identity_fields("a@x.com", "U1", "", "Ada").is_err());
        assert!(validate_identity_fields("a@x.com", "U1", "pw", "").is_err());
    }

    // Database-backed flows (bootstrap, approval races, sole-admin
    // protection) are exercised by the integration tests in crewtask-api.
}
