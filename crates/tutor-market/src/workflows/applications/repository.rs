use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    AccountId, ApplicationStep, DocumentRecord, Profile, TeacherRecord, TeacherStatus,
};

/// Conditional status update: applied only while the stored status is one of
/// `allowed_from`, atomically with respect to other updates of the same row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub allowed_from: &'static [TeacherStatus],
    pub to: TeacherStatus,
    pub rejection_reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Platform store for profiles, teacher records, progress steps, and documents.
///
/// Implementations must reject a second teacher record for an email that already has
/// one with [`RepositoryError::Conflict`].
pub trait TeacherRepository: Send + Sync {
    fn insert_profile(&self, profile: Profile) -> Result<Profile, RepositoryError>;
    fn insert_teacher(&self, record: TeacherRecord) -> Result<TeacherRecord, RepositoryError>;
    fn insert_steps(&self, steps: Vec<ApplicationStep>) -> Result<(), RepositoryError>;
    fn insert_document(&self, document: DocumentRecord) -> Result<DocumentRecord, RepositoryError>;
    /// Teacher records for `email`, newest first.
    fn find_by_email(&self, email: &str) -> Result<Vec<TeacherRecord>, RepositoryError>;
    fn fetch(&self, id: &AccountId) -> Result<Option<TeacherRecord>, RepositoryError>;
    /// Teacher records filtered by status (all when `None`), newest first.
    fn list(&self, status: Option<TeacherStatus>) -> Result<Vec<TeacherRecord>, RepositoryError>;
    fn documents(&self, id: &AccountId) -> Result<Vec<DocumentRecord>, RepositoryError>;
    fn steps(&self, id: &AccountId) -> Result<Vec<ApplicationStep>, RepositoryError>;
    fn transition(
        &self,
        id: &AccountId,
        change: StatusChange,
    ) -> Result<TeacherRecord, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record is {current}, update not applied")]
    StatusMismatch { current: TeacherStatus },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read model returned for a single application.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub teacher: TeacherRecord,
    pub documents: Vec<DocumentRecord>,
    pub steps: Vec<ApplicationStep>,
}
