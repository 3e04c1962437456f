use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, CourseService, CreditLedger, EnrollmentService, OtpMailer, SeaOrmAuthService,
    SeaOrmCourseService, SeaOrmEnrollmentService, TracingMailer,
};

pub mod auth;
mod courses;
mod enrollments;
mod error;
mod observability;
mod types;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,

    pub config: Config,

    pub auth_service: Arc<dyn AuthService>,

    pub course_service: Arc<dyn CourseService>,

    pub enrollment_service: Arc<dyn EnrollmentService>,

    pub ledger: Arc<CreditLedger>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

#[must_use]
pub fn create_app_state(
    store: Store,
    config: Config,
    mailer: Arc<dyn OtpMailer>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let auth_service = Arc::new(SeaOrmAuthService::new(store.clone(), mailer));
    let course_service = Arc::new(SeaOrmCourseService::new(store.clone()));
    let enrollment_service = Arc::new(SeaOrmEnrollmentService::new(store.clone()));
    let ledger = Arc::new(CreditLedger::new(store.clone()));

    Arc::new(AppState {
        store,
        config,
        auth_service,
        course_service,
        enrollment_service,
        ledger,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::new(&config.general.database_path).await?;
    Ok(create_app_state(
        store,
        config,
        Arc::new(TracingMailer),
        prometheus_handle,
    ))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();
    let idle_minutes = state.config.server.session_idle_minutes;

    let protected_routes = create_protected_router(state.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(idle_minutes)));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/otp/send", post(auth::send_code))
        .route("/auth/otp/verify", post(auth::verify_code))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/courses", get(courses::list_courses))
        .route("/courses", post(courses::create_course))
        .route("/courses/available", get(courses::list_available_courses))
        .route("/courses/mine", get(courses::list_owned_courses))
        .route("/courses/{id}", get(courses::get_course))
        .route("/courses/{id}/pending", get(courses::list_pending_for_course))
        .route("/enrollments", post(enrollments::request_enrollment))
        .route(
            "/enrollments/pending",
            get(enrollments::list_pending_enrollments),
        )
        .route("/enrollments/mine", get(enrollments::list_my_enrollments))
        .route(
            "/enrollments/{id}/approve",
            post(enrollments::approve_enrollment),
        )
        .route(
            "/enrollments/{id}/reject",
            post(enrollments::reject_enrollment),
        )
        .route("/students/me/credits", get(enrollments::get_my_credits))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
