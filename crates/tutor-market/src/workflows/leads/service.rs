use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::workflows::applications::validation::{
    normalize_email, optional_text, required_text, ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parent matching request as posted by the lead form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated lead waiting for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub parent_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub subjects: Vec<String>,
    pub grade_level: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub parent_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub subjects: Vec<String>,
    pub grade_level: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lead storage. Assigns ids and rejects a second lead for the same email with
/// [`LeadRepositoryError::Conflict`].
pub trait LeadRepository: Send + Sync {
    fn insert(&self, lead: NewLead) -> Result<Lead, LeadRepositoryError>;
    /// Leads for `email`, newest first.
    fn find_by_email(&self, email: &str) -> Result<Vec<Lead>, LeadRepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeadRepositoryError {
    #[error("lead already exists")]
    Conflict,
    #[error("lead store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Carries the stored lead when it could be read back.
    #[error("a request for this email address already exists")]
    Duplicate(Option<Box<Lead>>),
    #[error("failed to check existing requests")]
    StatusCheck(#[source] LeadRepositoryError),
    #[error("failed to save request: {0}")]
    Storage(#[source] LeadRepositoryError),
}

pub struct LeadService<R> {
    repository: Arc<R>,
}

impl<R: LeadRepository> LeadService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn submit(&self, submission: LeadSubmission) -> Result<Lead, LeadError> {
        let lead = validate_lead(submission)?;

        let existing = self
            .repository
            .find_by_email(&lead.email)
            .map_err(|source| {
                error!(email = %lead.email, error = %source, "lead duplicate check failed");
                LeadError::StatusCheck(source)
            })?;
        if let Some(latest) = existing.into_iter().max_by_key(|lead| lead.created_at) {
            info!(email = %lead.email, lead_id = %latest.id, "duplicate lead rejected");
            return Err(LeadError::Duplicate(Some(Box::new(latest))));
        }

        let email = lead.email.clone();
        match self.repository.insert(lead) {
            Ok(stored) => {
                info!(lead_id = %stored.id, "parent lead captured");
                Ok(stored)
            }
            Err(LeadRepositoryError::Conflict) => {
                info!(%email, "lead unique constraint hit");
                let latest = self
                    .repository
                    .find_by_email(&email)
                    .ok()
                    .and_then(|leads| leads.into_iter().next());
                Err(LeadError::Duplicate(latest.map(Box::new)))
            }
            Err(source) => {
                error!(%email, error = %source, "lead insert failed");
                Err(LeadError::Storage(source))
            }
        }
    }
}

fn validate_lead(submission: LeadSubmission) -> Result<NewLead, ValidationError> {
    let parent_name = required_text(&submission.parent_name, "parentName")?;
    let email = normalize_email(&submission.email)?;
    let subjects = submission
        .subjects
        .into_iter()
        .map(|subject| subject.trim().to_string())
        .filter(|subject| !subject.is_empty())
        .collect();

    Ok(NewLead {
        parent_name,
        email,
        phone: optional_text(submission.phone),
        location: optional_text(submission.location),
        subjects,
        grade_level: optional_text(submission.grade_level),
        notes: optional_text(submission.notes),
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryLeads {
        leads: Mutex<Vec<Lead>>,
        offline: bool,
        blind_lookup: bool,
    }

    impl LeadRepository for MemoryLeads {
        fn insert(&self, lead: NewLead) -> Result<Lead, LeadRepositoryError> {
            if self.offline {
                return Err(LeadRepositoryError::Unavailable("offline".to_string()));
            }
            let mut leads = self.leads.lock().expect("lead mutex poisoned");
            if leads.iter().any(|existing| existing.email == lead.email) {
                return Err(LeadRepositoryError::Conflict);
            }
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
            if self.offline {
                return Err(LeadRepositoryError::Unavailable("offline".to_string()));
            }
            if self.blind_lookup {
                return Ok(Vec::new());
            }
            let leads = self.leads.lock().expect("lead mutex poisoned");
            Ok(leads
                .iter()
                .filter(|lead| lead.email == email)
                .cloned()
                .collect())
        }
    }

    fn submission() -> LeadSubmission {
        LeadSubmission {
            parent_name: " Wanjiru Kamau ".to_string(),
            email: "Wanjiru@Example.com".to_string(),
            phone: Some("+254711000000".to_string()),
            location: Some("Kileleshwa".to_string()),
            subjects: vec!["Mathematics".to_string(), " ".to_string()],
            grade_level: Some("Grade 6".to_string()),
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn captures_a_normalised_lead() {
        let service = LeadService::new(Arc::new(MemoryLeads::default()));

        let lead = service.submit(submission()).expect("lead stored");

        assert_eq!(lead.id, LeadId("lead-000001".to_string()));
        assert_eq!(lead.parent_name, "Wanjiru Kamau");
        assert_eq!(lead.email, "wanjiru@example.com");
        assert_eq!(lead.subjects, vec!["Mathematics".to_string()]);
        assert_eq!(lead.notes, None);
    }

    #[test]
    fn second_lead_for_the_same_email_is_a_duplicate() {
        let service = LeadService::new(Arc::new(MemoryLeads::default()));
        let first = service.submit(submission()).expect("first");

        let error = service.submit(submission()).expect_err("duplicate");

        assert_eq!(error, LeadError::Duplicate(Some(Box::new(first))));
    }

    #[test]
    fn unique_constraint_backs_up_the_lookup() {
        let repository = Arc::new(MemoryLeads {
            blind_lookup: true,
            ..MemoryLeads::default()
        });
        let service = LeadService::new(repository.clone());
        service.submit(submission()).expect("first");

        let error = service.submit(submission()).expect_err("constraint");

        assert_eq!(error, LeadError::Duplicate(None));
        assert_eq!(repository.leads.lock().expect("lead mutex poisoned").len(), 1);
    }

    #[test]
    fn lookup_failure_is_fatal() {
        let service = LeadService::new(Arc::new(MemoryLeads {
            offline: true,
            ..MemoryLeads::default()
        }));

        assert!(matches!(
            service.submit(submission()),
            Err(LeadError::StatusCheck(_))
        ));
    }

    #[test]
    fn parent_name_is_required() {
        let service = LeadService::new(Arc::new(MemoryLeads::default()));
        let mut submission = submission();
        submission.parent_name.clear();

        assert_eq!(
            service.submit(submission),
            Err(LeadError::Validation(ValidationError::MissingField(
                "parentName"
            )))
        );
    }
}
