//! Rate-limited sign-in link requests for returning applicants.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::security::RateLimiter;
use crate::workflows::applications::gateways::{IdentityError, IdentityProvider};
use crate::workflows::applications::validation::{normalize_email, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignInError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("too many sign-in requests; try again later")]
    RateLimited,
    #[error("failed to send sign-in link: {0}")]
    Provider(#[source] IdentityError),
}

pub struct SignInLinkService<P, L> {
    identity: Arc<P>,
    limiter: Arc<L>,
    redirect_to: String,
}

impl<P, L> SignInLinkService<P, L>
where
    P: IdentityProvider,
    L: RateLimiter,
{
    pub fn new(identity: Arc<P>, limiter: Arc<L>, redirect_to: impl Into<String>) -> Self {
        Self {
            identity,
            limiter,
            redirect_to: redirect_to.into(),
        }
    }

    /// Unknown emails succeed silently so the endpoint cannot be used to probe accounts.
    pub fn request_link(&self, raw_email: &str) -> Result<(), SignInError> {
        let email = normalize_email(raw_email)?;

        if !self.limiter.allow(&email) {
            warn!(%email, "sign-in link request rate limited");
            return Err(SignInError::RateLimited);
        }

        match self.identity.issue_sign_in_link(&email, &self.redirect_to) {
            Ok(()) => {
                info!(%email, "sign-in link issued");
                Ok(())
            }
            Err(IdentityError::NotFound) => {
                info!(%email, "sign-in link requested for unknown account");
                Ok(())
            }
            Err(error) => Err(SignInError::Provider(error)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignInRequest {
    #[serde(default)]
    email: String,
}

pub fn sign_in_router<P, L>(service: Arc<SignInLinkService<P, L>>) -> Router
where
    P: IdentityProvider + 'static,
    L: RateLimiter + 'static,
{
    Router::new()
        .route("/api/v1/auth/sign-in-link", post(sign_in_handler::<P, L>))
        .with_state(service)
}

pub(crate) async fn sign_in_handler<P, L>(
    State(service): State<Arc<SignInLinkService<P, L>>>,
    Json(request): Json<SignInRequest>,
) -> Response
where
    P: IdentityProvider + 'static,
    L: RateLimiter + 'static,
{
    match service.request_link(&request.email) {
        Ok(()) => {
            let payload = json!({
                "success": true,
                "message": "If an account exists for this email, a sign-in link is on its way.",
            });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(SignInError::Validation(error)) => {
            let payload = json!({
                "success": false,
                "error": "VALIDATION_ERROR",
                "message": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(SignInError::RateLimited) => {
            let payload = json!({
                "success": false,
                "error": "RATE_LIMITED",
                "message": SignInError::RateLimited.to_string(),
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(payload)).into_response()
        }
        Err(other) => {
            warn!(error = %other, "sign-in link dispatch failed");
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
