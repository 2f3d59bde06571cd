/// Common test utilities for integration tests
///
/// These tests need a running PostgreSQL database. Set DATABASE_URL to
/// enable them; without it every test skips with a note. Each TestContext
/// runs the migrations and drives the real router, so the tests exercise
/// the same code paths as production requests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use crewtask_api::app::{build_router, AppState};
use crewtask_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

/// Secret used for token signing in tests
pub const TEST_JWT_SECRET: &str = "integration-test-secret-key-0123456789abcdef";

/// Test context holding the app router and its database pool
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
}

impl TestContext {
    /// Creates a test context, or None when DATABASE_URL is unset
    pub async fn new() -> anyhow::Result<Option<Self>> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return Ok(None);
        };

        let db = PgPool::connect(&database_url).await?;
        crewtask_shared::db::migrations::run_migrations(&db).await?;

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: TEST_JWT_SECRET.to_string(),
            },
            email: None,
        };

        let state = AppState::new(db.clone(), config);
        let app = build_router(state);

        Ok(Some(TestContext { db, app }))
    }

    /// Sends a request and returns status plus parsed JSON body
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Registers a brand-new organization and its bootstrap admin
    ///
    /// Returns (user body, access token).
    pub async fn register_admin(&self, company: &str) -> (Value, String) {
        let suffix = Uuid::new_v4().simple().to_string();
        let (status, body) = self
            .request(
                "POST",
                "/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "email": format!("admin-{suffix}@example.com"),
                    "unique_id": format!("ADM-{suffix}"),
                    "password": "Secure123!",
                    "display_name": "Test Admin",
                    "role": "admin",
                    "company_name": company,
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED, "admin registration failed: {body}");

        let token = body["access_token"].as_str().unwrap().to_string();
        (body["user"].clone(), token)
    }

    /// Pre-registers a member under a referring admin and approves them
    ///
    /// Returns (user body, access token, plaintext password).
    pub async fn register_member(
        &self,
        admin_id: &str,
        admin_token: &str,
    ) -> (Value, String, String) {
        let suffix = Uuid::new_v4().simple().to_string();
        let email = format!("member-{suffix}@example.com");
        let password = "Member123!".to_string();

        let (status, pending) = self
            .request(
                "POST",
                "/v1/auth/pre-register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "unique_id": format!("MEM-{suffix}"),
                    "password": password,
                    "display_name": "Test Member",
                    "referring_admin_id": admin_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "pre-registration failed: {pending}");

        let pending_id = pending["id"].as_str().unwrap();
        let (status, user) = self
            .request(
                "POST",
                &format!("/v1/pending-users/{pending_id}/approve"),
                Some(admin_token),
                Some(serde_json::json!({})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "approval failed: {user}");

        let (status, login) = self
            .request(
                "POST",
                "/v1/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "member login failed: {login}");

        let token = login["access_token"].as_str().unwrap().to_string();
        (user, token, password)
    }

    /// Creates a task as the given admin
    pub async fn create_task(&self, admin_token: &str, title: &str) -> Value {
        let (status, task) = self
            .request(
                "POST",
                "/v1/tasks",
                Some(admin_token),
                Some(serde_json::json!({
                    "title": title,
                    "description": "integration test task",
                    "required_skills": "none",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "task creation failed: {task}");
        task
    }
}

/// Macro-free skip helper: logs and returns None when no database is wired
pub async fn context_or_skip() -> Option<TestContext> {
    match TestContext::new().await {
        Ok(Some(ctx)) => Some(ctx),
        Ok(None) => {
            eprintln!("skipping integration test: DATABASE_URL not set");
            None
        }
        Err(err) => panic!("failed to build test context: {err}"),
    }
}
