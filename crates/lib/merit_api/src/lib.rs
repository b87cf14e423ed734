//! # merit_api
//!
//! HTTP API library for Merit.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use merit_core::achievement::AchievementService;
use merit_core::achievement::pg::{PgAchievementStore, PgReferenceProjection, PgStudentDirectory};
use merit_core::audit::AuditRecorder;
use merit_core::cache::PermissionCache;
use merit_core::models::auth::perms;
use merit_core::notifications::PgNotifier;
use merit_core::rate_limit::RateLimiter;

use crate::config::ApiConfig;
use crate::handlers::{achievements, auth, notifications};
use crate::middleware::rate_limit::RouteBudget;

/// Shared application state passed to all handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Permission cache refreshed at authentication time.
    pub permissions: Arc<PermissionCache>,
    /// Sliding-window request budgets.
    pub limiter: Arc<RateLimiter>,
    /// Append-only audit trail.
    pub audit: AuditRecorder,
    /// Achievement lifecycle service.
    pub achievements: Arc<AchievementService>,
}

impl AppState {
    /// Wire up state against Postgres-backed stores.
    ///
    /// Must be called from within a tokio runtime (the audit recorder
    /// spawns its writer task).
    pub fn new(pool: PgPool, config: ApiConfig) -> Self {
        let achievements = Arc::new(AchievementService::new(
            Arc::new(PgAchievementStore::new(pool.clone())),
            Arc::new(PgReferenceProjection::new(pool.clone())),
            Arc::new(PgNotifier::new(pool.clone())),
            Arc::new(PgStudentDirectory::new(pool.clone())),
        ));
        let audit = AuditRecorder::new(config.audit_log_dir.clone());
        Self {
            pool,
            config,
            permissions: Arc::new(PermissionCache::new()),
            limiter: Arc::new(RateLimiter::new()),
            audit,
            achievements,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `merit_core::migrate::migrate()` which owns the migration
/// files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    merit_core::migrate::migrate(pool).await
}

const NEEDS_CREATE: &[&str] = &[perms::CREATE_ACHIEVEMENT];
const NEEDS_UPDATE: &[&str] = &[perms::UPDATE_ACHIEVEMENT];
const NEEDS_DELETE: &[&str] = &[perms::DELETE_ACHIEVEMENT];
const NEEDS_VERIFY: &[&str] = &[perms::VERIFY_ACHIEVEMENT];
const NEEDS_VIEW_ALL: &[&str] = &[perms::VIEW_ALL];

const LOGIN_BUDGET: RouteBudget = RouteBudget::per_minute("login", 10);
const LIST_BUDGET: RouteBudget = RouteBudget::per_hour("achievements_list", 200);
const ADVISEES_BUDGET: RouteBudget = RouteBudget::per_hour("achievements_advisees", 50);
const CREATE_BUDGET: RouteBudget = RouteBudget::per_hour("achievements_create", 10);
const DELETE_BUDGET: RouteBudget = RouteBudget::per_hour("achievements_delete", 5);

/// Builds the Axum router with all routes and shared state.
///
/// Layer order, outermost first: audit, CORS, then per-group
/// authentication, permission, and route-budget layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(
            "/api/v1/auth/login",
            post(auth::login_handler).route_layer(from_fn_with_state(
                (state.clone(), LOGIN_BUDGET),
                middleware::rate_limit::per_ip,
            )),
        )
        .route("/api/v1/auth/refresh", post(auth::refresh_handler));

    let achievement_reads = Router::new()
        .route(
            "/api/v1/achievements",
            get(achievements::list_handler).route_layer(from_fn_with_state(
                (state.clone(), LIST_BUDGET),
                middleware::rate_limit::per_user,
            )),
        )
        .route("/api/v1/achievements/{id}", get(achievements::get_handler));

    let achievement_advisees = Router::new()
        .route(
            "/api/v1/achievements/advisees",
            get(achievements::advisees_handler).route_layer(from_fn_with_state(
                (state.clone(), ADVISEES_BUDGET),
                middleware::rate_limit::per_user,
            )),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), NEEDS_VIEW_ALL),
            middleware::permission::require_permissions,
        ));

    let achievement_create = Router::new()
        .route(
            "/api/v1/achievements",
            post(achievements::create_handler).route_layer(from_fn_with_state(
                (state.clone(), CREATE_BUDGET, perms::CREATE_ACHIEVEMENT),
                middleware::rate_limit::per_user_permission,
            )),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), NEEDS_CREATE),
            middleware::permission::require_permissions,
        ));

    let achievement_updates = Router::new()
        .route(
            "/api/v1/achievements/{id}",
            put(achievements::update_handler),
        )
        .route(
            "/api/v1/achievements/{id}/submit",
            post(achievements::submit_handler),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), NEEDS_UPDATE),
            middleware::permission::require_permissions,
        ));

    let achievement_delete = Router::new()
        .route(
            "/api/v1/achievements/{id}",
            delete(achievements::delete_handler).route_layer(from_fn_with_state(
                (state.clone(), DELETE_BUDGET, perms::DELETE_ACHIEVEMENT),
                middleware::rate_limit::per_user_permission,
            )),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), NEEDS_DELETE),
            middleware::permission::require_permissions,
        ));

    let achievement_review = Router::new()
        .route(
            "/api/v1/achievements/{id}/verify",
            post(achievements::verify_handler),
        )
        .route(
            "/api/v1/achievements/{id}/reject",
            post(achievements::reject_handler),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), NEEDS_VERIFY),
            middleware::permission::require_permissions,
        ));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/api/v1/auth/profile", get(auth::profile_handler))
        .route(
            "/api/v1/notifications",
            get(notifications::list_handler),
        )
        .route(
            "/api/v1/notifications/{id}/read",
            post(notifications::mark_read_handler),
        )
        .merge(achievement_reads)
        .merge(achievement_advisees)
        .merge(achievement_create)
        .merge(achievement_updates)
        .merge(achievement_delete)
        .merge(achievement_review)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(from_fn_with_state(state.clone(), middleware::audit::audit_log))
        .with_state(state)
}
