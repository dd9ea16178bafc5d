use std::sync::Arc;

use tracing::{info, warn};

use super::gateways::IdentityProvider;

/// Sends the post-intake sign-in link. Delivery problems are logged, never surfaced.
pub struct NotificationDispatcher<P> {
    identity: Arc<P>,
    redirect_to: String,
}

impl<P: IdentityProvider> NotificationDispatcher<P> {
    pub fn new(identity: Arc<P>, redirect_to: impl Into<String>) -> Self {
        Self {
            identity,
            redirect_to: redirect_to.into(),
        }
    }

    /// Returns whether the link was handed to the provider.
    pub fn dispatch(&self, email: &str) -> bool {
        match self.identity.issue_sign_in_link(email, &self.redirect_to) {
            Ok(()) => {
                info!(%email, redirect_to = %self.redirect_to, "sign-in link dispatched");
                true
            }
            Err(error) => {
                warn!(%email, %error, "sign-in link dispatch failed");
                false
            }
        }
    }
}
