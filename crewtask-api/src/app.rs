/// Application state and router builder
///
/// Defines the shared application state and builds the Axum router with all
/// routes and middleware.
///
/// # Example
///
/// ```no_run
/// use crewtask_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = crewtask_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    extract::Request,
    http::{header, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use crewtask_shared::auth::{context::resolve_context, jwt};
use crewtask_shared::lifecycle::{assignment::AssignmentManager, identity::IdentityManager};
use crewtask_shared::notify::{EmailNotifier, NoopNotifier, Notifier};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned per request via Axum's `State` extractor; everything inside is
/// behind an `Arc` or is itself a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Identity lifecycle manager
    pub identity: Arc<IdentityManager>,

    /// Assignment lifecycle manager
    pub assignments: Arc<AssignmentManager>,
}

impl AppState {
    /// Creates application state, wiring the lifecycle managers to the
    /// configured notification channel
    pub fn new(db: PgPool, config: Config) -> Self {
        let notifier: Arc<dyn Notifier> = match &config.email {
            Some(email) => Arc::new(EmailNotifier::new(email.to_notifier_config())),
            None => Arc::new(NoopNotifier),
        };

        let identity = Arc::new(IdentityManager::new(db.clone(), Arc::clone(&notifier)));
        let assignments = Arc::new(AssignmentManager::new(db.clone(), notifier));

        Self {
            db,
            config: Arc::new(config),
            identity,
            assignments,
        }
    }

    /// Gets the JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /v1/
///     ├── /auth/                       # register, login, refresh, pre-register (public)
///     ├── /pending-users               # review queue (admin)
///     ├── /users                       # profile + role management (authenticated)
///     ├── /programs                    # program CRUD (authenticated)
///     ├── /tasks                       # task CRUD (authenticated)
///     └── /assignments                 # assignment lifecycle (authenticated)
/// ```
///
/// Authenticated routes run the JWT layer, which validates the bearer token
/// and re-checks its claims against the live user record before injecting an
/// `AuthContext` into request extensions.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Public: registration, login, refresh, and referral-gated pre-registration.
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/pre-register", post(routes::pending_users::submit));

    // Everything below requires an authenticated, live-checked context.
    let pending_routes = Router::new()
        .route("/", get(routes::pending_users::list))
        .route("/:id/approve", post(routes::pending_users::approve))
        .route("/:id", delete(routes::pending_users::reject));

    let user_routes = Router::new()
        .route("/", get(routes::users::list))
        .route("/:id", get(routes::users::get))
        .route("/:id", put(routes::users::update))
        .route("/:id/role", put(routes::users::change_role))
        .route("/:id", delete(routes::users::remove));

    let program_routes = Router::new()
        .route("/", get(routes::programs::list))
        .route("/", post(routes::programs::create))
        .route("/:id", delete(routes::programs::remove));

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list))
        .route("/", post(routes::tasks::create))
        .route("/:id", get(routes::tasks::get))
        .route("/:id", put(routes::tasks::update))
        .route("/:id", delete(routes::tasks::remove));

    let assignment_routes = Router::new()
        .route("/", get(routes::assignments::list))
        .route("/", post(routes::assignments::create))
        .route("/:id", get(routes::assignments::get))
        .route("/:id", put(routes::assignments::update))
        .route("/:id", delete(routes::assignments::remove));

    let protected = Router::new()
        .nest("/pending-users", pending_routes)
        .nest("/users", user_routes)
        .nest("/programs", program_routes)
        .nest("/tasks", task_routes)
        .nest("/assignments", assignment_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new().nest("/auth", auth_routes).merge(protected);

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// JWT authentication middleware
///
/// Extracts and validates the bearer token, re-checks the claims against
/// the live user record (rejecting stale tokens), and injects the resulting
/// `AuthContext` into request extensions.
async fn jwt_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, crate::error::ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            crate::error::ApiError::Unauthorized("Missing authorization header".to_string())
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| crate::error::ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    // The token asserts what was true at issuance; authorization decisions
    // use what is true now.
    let auth_context = resolve_context(&state.db, &claims).await?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
