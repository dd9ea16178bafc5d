use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{AccountId, TeacherApplicationSubmission, TeacherRecord, TeacherStatus};
use super::gateways::{DocumentStore, IdentityProvider};
use super::repository::{ApplicationDetail, TeacherRepository};
use super::service::{IntakeError, TeacherApplicationService};
use crate::error::AppError;

/// Bearer token gate for staff review actions. Without a token every caller is staff,
/// which is only meant for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaffAccess {
    token: Option<String>,
}

impl StaffAccess {
    pub fn open() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let Some(expected) = self.token.as_deref() else {
            return Ok(());
        };

        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if token == expected => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }
}

pub struct ApplicationState<R, P, S> {
    pub service: Arc<TeacherApplicationService<R, P, S>>,
    pub staff: StaffAccess,
}

impl<R, P, S> Clone for ApplicationState<R, P, S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            staff: self.staff.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    status: Option<TeacherStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RejectRequest {
    #[serde(default)]
    reason: String,
}

/// Router builder exposing intake, listing, and staff review endpoints.
pub fn application_router<R, P, S>(
    service: Arc<TeacherApplicationService<R, P, S>>,
    staff: StaffAccess,
) -> Router
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    let body_limit = service.max_request_bytes();
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<R, P, S>).get(list_handler::<R, P, S>),
        )
        .route(
            "/api/v1/applications/:teacher_id",
            get(detail_handler::<R, P, S>),
        )
        .route(
            "/api/v1/applications/:teacher_id/review",
            post(start_review_handler::<R, P, S>),
        )
        .route(
            "/api/v1/applications/:teacher_id/approve",
            post(approve_handler::<R, P, S>),
        )
        .route(
            "/api/v1/applications/:teacher_id/reject",
            post(reject_handler::<R, P, S>),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(ApplicationState { service, staff })
}

pub(crate) async fn submit_handler<R, P, S>(
    State(state): State<ApplicationState<R, P, S>>,
    Json(submission): Json<TeacherApplicationSubmission>,
) -> Response
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    let service = state.service.clone();
    let outcome = match tokio::task::spawn_blocking(move || service.submit(submission)).await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            error!(%join_error, "intake task did not complete");
            let payload = json!({ "error": "intake did not complete" });
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
        }
    };

    match outcome {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "userId": receipt.account_id,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(IntakeError::Validation(error)) => {
            let payload = json!({
                "success": false,
                "error": "VALIDATION_ERROR",
                "message": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(IntakeError::Duplicate(duplicate)) => {
            let payload = json!({
                "success": false,
                "error": "DUPLICATE_APPLICATION",
                "message": "An application with this email address already exists.",
                "data": duplicate,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn list_handler<R, P, S>(
    State(state): State<ApplicationState<R, P, S>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TeacherRecord>>, AppError>
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    Ok(Json(state.service.list(query.status)?))
}

pub(crate) async fn detail_handler<R, P, S>(
    State(state): State<ApplicationState<R, P, S>>,
    Path(teacher_id): Path<String>,
) -> Result<Json<ApplicationDetail>, AppError>
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    Ok(Json(state.service.get(&AccountId(teacher_id))?))
}

pub(crate) async fn start_review_handler<R, P, S>(
    State(state): State<ApplicationState<R, P, S>>,
    Path(teacher_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TeacherRecord>, AppError>
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    state.staff.authorize(&headers)?;
    Ok(Json(state.service.start_review(&AccountId(teacher_id))?))
}

pub(crate) async fn approve_handler<R, P, S>(
    State(state): State<ApplicationState<R, P, S>>,
    Path(teacher_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TeacherRecord>, AppError>
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    state.staff.authorize(&headers)?;
    Ok(Json(state.service.approve(&AccountId(teacher_id))?))
}

pub(crate) async fn reject_handler<R, P, S>(
    State(state): State<ApplicationState<R, P, S>>,
    Path(teacher_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RejectRequest>,
) -> Result<Json<TeacherRecord>, AppError>
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    state.staff.authorize(&headers)?;
    Ok(Json(
        state
            .service
            .reject(&AccountId(teacher_id), &request.reason)?,
    ))
}
