/// Integration tests for the CrewTask API
///
/// End-to-end coverage of the identity and assignment lifecycles through
/// the real router and a real PostgreSQL database:
/// - organization bootstrap and member approval (including the role
///   downgrade and the double-approve race loser)
/// - sole-admin protection and self-delete rejection
/// - credential pass-through (login with the original plaintext after
///   approval)
/// - assignment creation, duplicate prevention, and the transition
///   authorization matrix
/// - stale-token rejection after a role change
///
/// All tests skip when DATABASE_URL is not set.

mod common;

use axum::http::StatusCode;
use common::context_or_skip;
use serde_json::json;

#[tokio::test]
async fn test_admin_bootstrap_creates_tenant_and_sole_admin() {
    let Some(ctx) = context_or_skip().await else { return };

    let (user, token) = ctx.register_admin("Acme").await;

    assert_eq!(user["role"], "admin");
    assert!(user["tenant_id"].is_string());
    assert!(user.get("credential").is_none(), "credential must never be serialized");

    // The bootstrap admin can immediately use the API; the org contains
    // exactly one user.
    let (status, users) = ctx.request("GET", "/v1/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_member_registration_requires_tenant_context() {
    let Some(ctx) = context_or_skip().await else { return };

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "email": format!("orphan-{}@example.com", uuid::Uuid::new_v4().simple()),
                "unique_id": format!("ORP-{}", uuid::Uuid::new_v4().simple()),
                "password": "Secure123!",
                "display_name": "No Org",
                "role": "member",
            })),
        )
        .await;

    // No tenant and no referring admin: a configuration error, not a
    // silent default.
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn test_pre_registration_inherits_referrer_tenant() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;
    let (member, _token, _pw) = ctx
        .register_member(admin["id"].as_str().unwrap(), &admin_token)
        .await;

    assert_eq!(member["tenant_id"], admin["tenant_id"]);
    assert_eq!(member["role"], "member");
    assert_eq!(member["referring_admin_id"], admin["id"]);
}

#[tokio::test]
async fn test_duplicate_pre_registration_conflicts() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, _token) = ctx.register_admin("Acme").await;
    let admin_id = admin["id"].as_str().unwrap();

    let payload = json!({
        "email": format!("dup-{}@example.com", uuid::Uuid::new_v4().simple()),
        "unique_id": format!("DUP-{}", uuid::Uuid::new_v4().simple()),
        "password": "Secure123!",
        "display_name": "Dup",
        "referring_admin_id": admin_id,
    });

    let (status, _) = ctx
        .request("POST", "/v1/auth/pre-register", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Same identity again: collides with the existing pending record.
    let (status, body) = ctx
        .request("POST", "/v1/auth/pre-register", None, Some(payload))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn test_approval_downgrades_admin_request_when_admin_exists() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let (status, pending) = ctx
        .request(
            "POST",
            "/v1/auth/pre-register",
            None,
            Some(json!({
                "email": format!("elevate-{suffix}@example.com"),
                "unique_id": format!("ELV-{suffix}"),
                "password": "Secure123!",
                "display_name": "Wants Admin",
                "referring_admin_id": admin["id"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Requesting admin while Acme already has one: approval succeeds but
    // the resulting user is a member.
    let pending_id = pending["id"].as_str().unwrap();
    let (status, user) = ctx
        .request(
            "POST",
            &format!("/v1/pending-users/{pending_id}/approve"),
            Some(&admin_token),
            Some(json!({ "role": "admin" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{user}");
    assert_eq!(user["role"], "member");
}

#[tokio::test]
async fn test_second_approval_of_same_pending_fails() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let (_, pending) = ctx
        .request(
            "POST",
            "/v1/auth/pre-register",
            None,
            Some(json!({
                "email": format!("twice-{suffix}@example.com"),
                "unique_id": format!("TWC-{suffix}"),
                "password": "Secure123!",
                "display_name": "Approved Twice",
                "referring_admin_id": admin["id"],
            })),
        )
        .await;

    let pending_id = pending["id"].as_str().unwrap();
    let approve_path = format!("/v1/pending-users/{pending_id}/approve");

    let (status, _) = ctx
        .request("POST", &approve_path, Some(&admin_token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // The pending record is gone; the loser of the race sees 404 (or 409
    // when it lost between the pre-check and the insert).
    let (status, body) = ctx
        .request("POST", &approve_path, Some(&admin_token), Some(json!({})))
        .await;
    assert!(
        status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT,
        "expected 404/409, got {status}: {body}"
    );
}

#[tokio::test]
async fn test_credential_survives_approval_without_rehash() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;

    // register_member logs in with the original plaintext after approval;
    // if the stored hash had been hashed again, that login would fail.
    let (_member, member_token, _password) = ctx
        .register_member(admin["id"].as_str().unwrap(), &admin_token)
        .await;

    assert!(!member_token.is_empty());
}

#[tokio::test]
async fn test_sole_admin_cannot_be_demoted_or_deleted() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;
    let admin_id = admin["id"].as_str().unwrap();
    let (member, _mt, _pw) = ctx.register_member(admin_id, &admin_token).await;

    // Deleting the sole admin must fail even when attempted by an admin
    // other than the target... but there is only one, and self-deletion is
    // rejected first.
    let (status, body) = ctx
        .request(
            "DELETE",
            &format!("/v1/users/{admin_id}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    // Promote the member, then the original admin can be deleted by the
    // new one.
    let member_id = member["id"].as_str().unwrap();
    let (status, promoted) = ctx
        .request(
            "PUT",
            &format!("/v1/users/{member_id}/role"),
            Some(&admin_token),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{promoted}");

    // The promoted user needs a fresh token reflecting the new role.
    let (status, login) = ctx
        .request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": member["email"], "password": "Member123!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{login}");
    let second_admin_token = login["access_token"].as_str().unwrap();

    let (status, body) = ctx
        .request(
            "DELETE",
            &format!("/v1/users/{admin_id}"),
            Some(second_admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");

    // Demoting the now-sole admin also fails.
    let (status, body) = ctx
        .request(
            "PUT",
            &format!("/v1/users/{member_id}/role"),
            Some(second_admin_token),
            Some(json!({ "role": "member" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
}

#[tokio::test]
async fn test_concurrent_demotions_leave_one_admin() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin_a, token_a) = ctx.register_admin("Acme").await;
    let (member, _mt, _pw) = ctx
        .register_member(admin_a["id"].as_str().unwrap(), &token_a)
        .await;

    // Promote the member so the org has two admins.
    let member_id = member["id"].as_str().unwrap();
    let (status, _) = ctx
        .request(
            "PUT",
            &format!("/v1/users/{member_id}/role"),
            Some(&token_a),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, login) = ctx
        .request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": member["email"], "password": "Member123!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token_b = login["access_token"].as_str().unwrap().to_string();

    // Each admin demotes the other at the same time. The row locks
    // serialize the two transactions, so exactly one demotion lands and
    // the loser hits the sole-admin floor.
    let admin_a_id = admin_a["id"].as_str().unwrap();
    let demote_b = ctx.request(
        "PUT",
        &format!("/v1/users/{member_id}/role"),
        Some(&token_a),
        Some(json!({ "role": "member" })),
    );
    let demote_a = ctx.request(
        "PUT",
        &format!("/v1/users/{admin_a_id}/role"),
        Some(&token_b),
        Some(json!({ "role": "member" })),
    );

    let ((status_b, body_b), (status_a, body_a)) = tokio::join!(demote_b, demote_a);

    // Exactly one demotion lands. The loser is rejected either by the
    // sole-admin floor (403) or, when the winner committed first, by the
    // stale-token check on its now-outdated role claim (401).
    let ok_count = [status_b, status_a]
        .iter()
        .filter(|s| **s == StatusCode::OK)
        .count();
    let rejected_count = [status_b, status_a]
        .iter()
        .filter(|s| **s == StatusCode::FORBIDDEN || **s == StatusCode::UNAUTHORIZED)
        .count();

    assert_eq!(
        (ok_count, rejected_count),
        (1, 1),
        "expected one success and one rejection, got {status_b} ({body_b}) and {status_a} ({body_a})"
    );
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;
    let admin_id = admin["id"].as_str().unwrap();
    let (member, _mt, _pw) = ctx.register_member(admin_id, &admin_token).await;

    // Even with a second admin present, self-deletion is rejected.
    let member_id = member["id"].as_str().unwrap();
    ctx.request(
        "PUT",
        &format!("/v1/users/{member_id}/role"),
        Some(&admin_token),
        Some(json!({ "role": "admin" })),
    )
    .await;

    let (status, body) = ctx
        .request(
            "DELETE",
            &format!("/v1/users/{admin_id}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, _token) = ctx.register_admin("Acme").await;

    let (wrong_pw_status, wrong_pw_body) = ctx
        .request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": admin["email"], "password": "WrongPass1!" })),
        )
        .await;

    let (unknown_status, unknown_body) = ctx
        .request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "WrongPass1!" })),
        )
        .await;

    assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    // Same error body either way: no account enumeration.
    assert_eq!(wrong_pw_body["message"], unknown_body["message"]);
}

#[tokio::test]
async fn test_stale_token_rejected_after_role_change() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;
    let (member, member_token, _pw) = ctx
        .register_member(admin["id"].as_str().unwrap(), &admin_token)
        .await;

    // The member token works before the role change.
    let (status, _) = ctx
        .request("GET", "/v1/assignments", Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let member_id = member["id"].as_str().unwrap();
    let (status, _) = ctx
        .request(
            "PUT",
            &format!("/v1/users/{member_id}/role"),
            Some(&admin_token),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The token still asserts role=member; the live record says admin.
    let (status, body) = ctx
        .request("GET", "/v1/assignments", Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
}

#[tokio::test]
async fn test_assignment_lifecycle_and_authorization() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;
    let (member, member_token, _pw) = ctx
        .register_member(admin["id"].as_str().unwrap(), &admin_token)
        .await;

    let task = ctx.create_task(&admin_token, "Inventory audit").await;

    // Admin proposes the task to the member.
    let (status, assignment) = ctx
        .request(
            "POST",
            "/v1/assignments",
            Some(&admin_token),
            Some(json!({
                "task_id": task["id"],
                "person_id": member["id"],
                "justification": "matching skills",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{assignment}");
    assert_eq!(assignment["status"], "pending_acceptance");
    assert_eq!(assignment["task_title"], "Inventory audit");
    assert_eq!(assignment["person_name"], "Test Member");

    // The same pair cannot be assigned twice.
    let (status, body) = ctx
        .request(
            "POST",
            "/v1/assignments",
            Some(&admin_token),
            Some(json!({
                "task_id": task["id"],
                "person_id": member["id"],
                "justification": "again",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let assignment_id = assignment["id"].as_str().unwrap();
    let assignment_path = format!("/v1/assignments/{assignment_id}");

    // Members may not move someone else's assignment; here the admin (not
    // the assignee, not approving) is equally forbidden.
    let (status, body) = ctx
        .request(
            "PUT",
            &assignment_path,
            Some(&admin_token),
            Some(json!({ "status": "accepted_by_user" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    // The assignee declines their own assignment in one hop.
    let (status, updated) = ctx
        .request(
            "PUT",
            &assignment_path,
            Some(&member_token),
            Some(json!({ "status": "declined_by_user" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["status"], "declined_by_user");

    // The assignee may not self-approve.
    let (status, body) = ctx
        .request(
            "PUT",
            &assignment_path,
            Some(&member_token),
            Some(json!({ "status": "completed_admin_approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    // The admin approves completion on the member's assignment.
    let (status, approved) = ctx
        .request(
            "PUT",
            &assignment_path,
            Some(&admin_token),
            Some(json!({ "status": "completed_admin_approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["status"], "completed_admin_approved");

    // Admin-only hard delete.
    let (status, body) = ctx
        .request("DELETE", &assignment_path, Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, _) = ctx
        .request("DELETE", &assignment_path, Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_assignment_deadline_falls_back_to_task() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;
    let (member, _mt, _pw) = ctx
        .register_member(admin["id"].as_str().unwrap(), &admin_token)
        .await;

    let deadline = "2026-09-30T12:00:00Z";
    let (status, task) = ctx
        .request(
            "POST",
            "/v1/tasks",
            Some(&admin_token),
            Some(json!({
                "title": "Quarterly report",
                "description": "write it",
                "required_skills": "writing",
                "deadline": deadline,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");

    let (status, assignment) = ctx
        .request(
            "POST",
            "/v1/assignments",
            Some(&admin_token),
            Some(json!({
                "task_id": task["id"],
                "person_id": member["id"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{assignment}");
    assert_eq!(assignment["deadline"], task["deadline"]);
}

#[tokio::test]
async fn test_tenant_isolation_between_organizations() {
    let Some(ctx) = context_or_skip().await else { return };

    let (_admin_a, token_a) = ctx.register_admin("Acme").await;
    let (admin_b, token_b) = ctx.register_admin("Globex").await;

    let task_b = ctx.create_task(&token_b, "Globex-only task").await;
    let task_b_id = task_b["id"].as_str().unwrap();

    // Acme's admin cannot see or touch Globex's task.
    let (status, _) = ctx
        .request("GET", &format!("/v1/tasks/{task_b_id}"), Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Cross-tenant approval is forbidden: a pending user of Globex cannot
    // be approved by Acme's admin.
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let (_, pending) = ctx
        .request(
            "POST",
            "/v1/auth/pre-register",
            None,
            Some(json!({
                "email": format!("globex-{suffix}@example.com"),
                "unique_id": format!("GLX-{suffix}"),
                "password": "Secure123!",
                "display_name": "Globex Member",
                "referring_admin_id": admin_b["id"],
            })),
        )
        .await;

    let pending_id = pending["id"].as_str().unwrap();
    let (status, body) = ctx
        .request(
            "POST",
            &format!("/v1/pending-users/{pending_id}/approve"),
            Some(&token_a),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
}

#[tokio::test]
async fn test_member_cannot_access_admin_surfaces() {
    let Some(ctx) = context_or_skip().await else { return };

    let (admin, admin_token) = ctx.register_admin("Acme").await;
    let (_member, member_token, _pw) = ctx
        .register_member(admin["id"].as_str().unwrap(), &admin_token)
        .await;

    let (status, _) = ctx
        .request("GET", "/v1/users", Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .request("GET", "/v1/pending-users", Some(&member_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .request(
            "POST",
            "/v1/tasks",
            Some(&member_token),
            Some(json!({
                "title": "not allowed",
                "description": "x",
                "required_skills": "x",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_authentication_required() {
    let Some(ctx) = context_or_skip().await else { return };

    let (status, _) = ctx.request("GET", "/v1/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .request("GET", "/v1/assignments", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_check() {
    let Some(ctx) = context_or_skip().await else { return };

    let (status, body) = ctx.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}
