use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tutor_market::security::RateLimiter;
use tutor_market::workflows::applications::{
    application_router, DocumentStore, IdentityProvider, StaffAccess, TeacherApplicationService,
    TeacherRepository,
};
use tutor_market::workflows::leads::{lead_router, LeadRepository, LeadService};
use tutor_market::workflows::sign_in::{sign_in_router, SignInLinkService};

/// Business routers backing the public API.
pub(crate) struct PlatformServices<R, P, S, Q, L> {
    pub(crate) applications: Arc<TeacherApplicationService<R, P, S>>,
    pub(crate) staff: StaffAccess,
    pub(crate) leads: Arc<LeadService<Q>>,
    pub(crate) sign_in: Arc<SignInLinkService<P, L>>,
}

pub(crate) fn with_platform_routes<R, P, S, Q, L>(
    services: PlatformServices<R, P, S, Q, L>,
) -> Router
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
    Q: LeadRepository + 'static,
    L: RateLimiter + 'static,
{
    application_router(services.applications, services.staff)
        .merge(lead_router(services.leads))
        .merge(sign_in_router(services.sign_in))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Acquire) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
