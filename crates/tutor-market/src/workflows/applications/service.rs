use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::composer::{CompositionError, CompositionStep, RecordComposer, SkippedStep};
use super::dedup::{DuplicateApplication, DuplicateChecker, ExistingIdentity};
use super::documents::{DocumentIngestor, DocumentReport};
use super::domain::{AccountId, TeacherApplicationSubmission, TeacherRecord, TeacherStatus};
use super::gateways::{DocumentStore, IdentityError, IdentityProvider};
use super::notification::NotificationDispatcher;
use super::provisioning::{IdentityProvisioner, ProvisionOutcome};
use super::repository::{ApplicationDetail, RepositoryError, TeacherRepository};
use super::review::{ReviewError, ReviewStateMachine};
use super::validation::{validate_submission, ValidationError};
use crate::config::{default_request_limit, IntakeConfig};

/// Tunables for the intake pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSettings {
    pub provider_page_size: u32,
    pub provider_max_pages: u32,
    pub max_document_bytes: u64,
    pub max_request_bytes: usize,
    pub dashboard_url: String,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            provider_page_size: 1000,
            provider_max_pages: 10,
            max_document_bytes: 10 * 1024 * 1024,
            max_request_bytes: default_request_limit(10 * 1024 * 1024),
            dashboard_url: "/dashboard/teacher".to_string(),
        }
    }
}

impl From<&IntakeConfig> for IntakeSettings {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            provider_page_size: config.provider_page_size,
            provider_max_pages: config.provider_max_pages,
            max_document_bytes: config.max_document_bytes,
            max_request_bytes: config.max_request_bytes,
            dashboard_url: config.dashboard_url.clone(),
        }
    }
}

/// Everything intake produced for an accepted application.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeReceipt {
    pub account_id: AccountId,
    pub teacher: TeacherRecord,
    pub documents: DocumentReport,
    pub skipped_steps: Vec<SkippedStep>,
    pub notification_sent: bool,
}

/// Fatal intake outcomes. Everything after record composition is best-effort and never
/// appears here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("an application already exists for this email address")]
    Duplicate(Box<DuplicateApplication>),
    #[error("failed to check application status")]
    StatusCheck(#[source] RepositoryError),
    #[error("failed to create applicant account: {0}")]
    Provisioning(#[source] IdentityError),
    #[error(transparent)]
    RecordComposition(#[from] CompositionError),
}

impl IntakeError {
    fn duplicate(existing: ExistingIdentity) -> Self {
        Self::Duplicate(Box::new(DuplicateApplication::from(existing)))
    }
}

/// Runs teacher intake end to end and exposes the staff review actions.
pub struct TeacherApplicationService<R, P, S> {
    repository: Arc<R>,
    dedup: DuplicateChecker<R, P>,
    provisioner: IdentityProvisioner<P>,
    composer: RecordComposer<R>,
    documents: DocumentIngestor<R, P, S>,
    notifier: NotificationDispatcher<P>,
    review: ReviewStateMachine<R>,
    max_request_bytes: usize,
}

impl<R, P, S> TeacherApplicationService<R, P, S>
where
    R: TeacherRepository + 'static,
    P: IdentityProvider + 'static,
    S: DocumentStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        identity: Arc<P>,
        store: Arc<S>,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            dedup: DuplicateChecker::new(
                repository.clone(),
                identity.clone(),
                settings.provider_page_size,
                settings.provider_max_pages,
            ),
            provisioner: IdentityProvisioner::new(identity.clone()),
            composer: RecordComposer::new(repository.clone()),
            documents: DocumentIngestor::new(
                repository.clone(),
                identity.clone(),
                store,
                settings.max_document_bytes,
            ),
            notifier: NotificationDispatcher::new(identity, settings.dashboard_url),
            review: ReviewStateMachine::new(repository.clone()),
            max_request_bytes: settings.max_request_bytes,
            repository,
        }
    }

    /// Upper bound for an intake request body.
    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// Validate, dedup, provision, compose, ingest documents, notify.
    pub fn submit(
        &self,
        submission: TeacherApplicationSubmission,
    ) -> Result<IntakeReceipt, IntakeError> {
        let application = validate_submission(submission)?;
        let email = application.identity.email.clone();

        let existing = self.dedup.check(&email).map_err(|source| {
            error!(%email, error = %source, "duplicate check against teacher store failed");
            IntakeError::StatusCheck(source)
        })?;
        if let Some(existing) = existing {
            info!(%email, "duplicate application rejected");
            return Err(IntakeError::duplicate(existing));
        }

        let account = match self.provisioner.provision(&application) {
            Ok(ProvisionOutcome::Created(account)) => account,
            Ok(ProvisionOutcome::AlreadyExists) => {
                warn!(%email, "identity provider reported an existing account after dedup");
                return Err(self.duplicate_after_race(&email));
            }
            Err(source) => {
                error!(%email, error = %source, "account provisioning failed");
                return Err(IntakeError::Provisioning(source));
            }
        };

        let now = Utc::now();
        let composed = match self.composer.compose(&account.id, &application, now) {
            Ok(composed) => composed,
            Err(CompositionError {
                step: CompositionStep::TeacherRecord,
                source: RepositoryError::Conflict,
            }) => {
                warn!(
                    %email,
                    account_id = %account.id,
                    "teacher record unique constraint hit; account left without application"
                );
                return Err(self.duplicate_after_race(&email));
            }
            Err(err) => {
                error!(
                    %email,
                    account_id = %account.id,
                    error = %err,
                    "record composition failed"
                );
                return Err(err.into());
            }
        };

        let documents = self
            .documents
            .ingest(&account.id, &application.details.documents, now);
        let notification_sent = self.notifier.dispatch(&email);

        info!(
            account_id = %account.id,
            documents = documents.stored().count(),
            "teacher application submitted"
        );

        Ok(IntakeReceipt {
            account_id: account.id,
            teacher: composed.teacher,
            documents,
            skipped_steps: composed.skipped,
            notification_sent,
        })
    }

    fn duplicate_after_race(&self, email: &str) -> IntakeError {
        match self.dedup.check(email) {
            Ok(Some(existing)) => IntakeError::duplicate(existing),
            Ok(None) | Err(_) => IntakeError::duplicate(ExistingIdentity::Unresolved {
                email: email.to_string(),
            }),
        }
    }

    pub fn list(
        &self,
        status: Option<TeacherStatus>,
    ) -> Result<Vec<TeacherRecord>, RepositoryError> {
        self.repository.list(status)
    }

    pub fn get(&self, teacher_id: &AccountId) -> Result<ApplicationDetail, RepositoryError> {
        let teacher = self
            .repository
            .fetch(teacher_id)?
            .ok_or(RepositoryError::NotFound)?;
        let documents = self.repository.documents(teacher_id)?;
        let steps = self.repository.steps(teacher_id)?;
        Ok(ApplicationDetail {
            teacher,
            documents,
            steps,
        })
    }

    pub fn start_review(&self, teacher_id: &AccountId) -> Result<TeacherRecord, ReviewError> {
        self.review.start_review(teacher_id)
    }

    pub fn approve(&self, teacher_id: &AccountId) -> Result<TeacherRecord, ReviewError> {
        self.review.approve(teacher_id)
    }

    pub fn reject(
        &self,
        teacher_id: &AccountId,
        reason: &str,
    ) -> Result<TeacherRecord, ReviewError> {
        self.review.reject(teacher_id, reason)
    }
}
