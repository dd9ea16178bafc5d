use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use super::service::{LeadError, LeadRepository, LeadService, LeadSubmission};

pub fn lead_router<R>(service: Arc<LeadService<R>>) -> Router
where
    R: LeadRepository + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(submit_lead_handler::<R>))
        .with_state(service)
}

pub(crate) async fn submit_lead_handler<R>(
    State(service): State<Arc<LeadService<R>>>,
    Json(submission): Json<LeadSubmission>,
) -> Response
where
    R: LeadRepository + 'static,
{
    match service.submit(submission) {
        Ok(lead) => {
            let payload = json!({ "success": true, "leadId": lead.id });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(LeadError::Validation(error)) => {
            let payload = json!({
                "success": false,
                "error": "VALIDATION_ERROR",
                "message": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(LeadError::Duplicate(existing)) => {
            let existing_lead = existing.map(|lead| {
                json!({
                    "id": lead.id,
                    "email": lead.email,
                    "createdAt": lead.created_at,
                })
            });
            let payload = json!({
                "success": false,
                "error": "DUPLICATE_LEAD",
                "message": "We already have a request for this email address.",
                "data": { "existingLead": existing_lead },
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::workflows::leads::service::{Lead, LeadId, LeadRepositoryError, NewLead};

    #[derive(Default)]
    struct MemoryLeads {
        leads: Mutex<Vec<Lead>>,
    }

    impl LeadRepository for MemoryLeads {
        fn insert(&self, lead: NewLead) -> Result<Lead, LeadRepositoryError> {
            let mut leads = self.leads.lock().expect("lead mutex poisoned");
            let stored = Lead {
                id: LeadId(format!("lead-{:06}", leads.len() + 1)),
                parent_name: lead.parent_name,
                email: lead.email,
                phone: lead.phone,
                location: lead.location,
                subjects: lead.subjects,
                grade_level: lead.grade_level,
                notes: lead.notes,
                created_at: lead.created_at,
            };
            leads.push(stored.clone());
            Ok(stored)
        }

        fn find_by_email(&self, email: &str) -> Result<Vec<Lead>, LeadRepositoryError> {
            let leads = self.leads.lock().expect("lead mutex poisoned");
            Ok(leads.iter().filter(|l| l.email == email).cloned().collect())
        }
    }

    fn request(body: &str) -> Request<Body> {
        Request::post("/api/v1/leads")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn lead_route_creates_then_rejects_duplicates() {
        let router = lead_router(Arc::new(LeadService::new(Arc::new(
            MemoryLeads::default(),
        ))));
        let body = r#"{"parentName":"Wanjiru Kamau","email":"wanjiru@example.com"}"#;

        let response = router
            .clone()
            .oneshot(request(body))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = json_body(response).await;
        assert_eq!(payload["leadId"], "lead-000001");

        let response = router.oneshot(request(body)).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let payload = json_body(response).await;
        assert_eq!(payload["error"], "DUPLICATE_LEAD");
        assert_eq!(payload["data"]["existingLead"]["id"], "lead-000001");
    }

    #[tokio::test]
    async fn lead_route_validates_input() {
        let router = lead_router(Arc::new(LeadService::new(Arc::new(
            MemoryLeads::default(),
        ))));

        let response = router
            .oneshot(request(r#"{"email":"wanjiru@example.com"}"#))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = json_body(response).await;
        assert_eq!(payload["message"], "parentName is required");
    }
}
