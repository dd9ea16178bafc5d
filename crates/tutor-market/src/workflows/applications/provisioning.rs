use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::info;

use super::domain::{Account, NewAccount, ValidatedApplication};
use super::gateways::{IdentityError, IdentityProvider};

/// Result of asking the provider for a new account.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionOutcome {
    Created(Account),
    /// The provider already knows this email; the dedup read lost a race.
    AlreadyExists,
}

/// Creates pre-confirmed accounts for applicants that passed the duplicate check.
pub struct IdentityProvisioner<P> {
    identity: Arc<P>,
}

impl<P: IdentityProvider> IdentityProvisioner<P> {
    pub fn new(identity: Arc<P>) -> Self {
        Self { identity }
    }

    pub fn provision(
        &self,
        application: &ValidatedApplication,
    ) -> Result<ProvisionOutcome, IdentityError> {
        let request = NewAccount {
            email: application.identity.email.clone(),
            email_confirmed: true,
            metadata: account_metadata(application),
        };

        match self.identity.create_account(request) {
            Ok(account) => {
                info!(
                    account_id = %account.id,
                    email = %account.email,
                    "applicant account created"
                );
                Ok(ProvisionOutcome::Created(account))
            }
            Err(IdentityError::AlreadyExists) => Ok(ProvisionOutcome::AlreadyExists),
            Err(other) => Err(other),
        }
    }
}

/// Applicant fields embedded in the provider account.
pub fn account_metadata(application: &ValidatedApplication) -> Map<String, Value> {
    let details = &application.details;
    let mut metadata = Map::new();
    metadata.insert("role".to_string(), json!("teacher"));
    metadata.insert("full_name".to_string(), json!(application.identity.full_name));
    metadata.insert("application_status".to_string(), json!("submitted"));

    let optional = [
        ("phone", &details.phone),
        ("location", &details.location),
        ("gender", &details.gender),
        ("hourly_rate_range", &details.hourly_rate_range),
        ("tsc_number", &details.tsc_number),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            metadata.insert(key.to_string(), json!(value));
        }
    }

    if let Some(date_of_birth) = details.date_of_birth {
        metadata.insert("date_of_birth".to_string(), json!(date_of_birth));
    }
    if let Some(years) = details.experience_years {
        metadata.insert("experience_years".to_string(), json!(years));
    }
    metadata.insert("subjects".to_string(), json!(details.subjects));
    metadata.insert("curricula".to_string(), json!(details.curricula));
    metadata.insert("grade_levels".to_string(), json!(details.grade_levels));

    metadata
}
