use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{AccountId, TeacherRecord, TeacherStatus};
use super::repository::{RepositoryError, StatusChange, TeacherRepository};

/// Staff decision applied to a teacher record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    StartReview,
    Approve,
    Reject { reason: String },
}

impl ReviewAction {
    pub const fn target(&self) -> TeacherStatus {
        match self {
            ReviewAction::StartReview => TeacherStatus::UnderReview,
            ReviewAction::Approve => TeacherStatus::Approved,
            ReviewAction::Reject { .. } => TeacherStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("application {0} not found")]
    NotFound(AccountId),
    #[error("application is already {current}; cannot move to {target}")]
    InvalidTransition {
        current: TeacherStatus,
        target: TeacherStatus,
    },
    #[error("a rejection reason is required")]
    MissingReason,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Drives `submitted -> under_review -> approved | rejected`.
///
/// Legality is enforced by the repository's conditional update, so two racing staff
/// actions cannot both succeed.
pub struct ReviewStateMachine<R> {
    repository: Arc<R>,
}

impl<R: TeacherRepository> ReviewStateMachine<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn apply(
        &self,
        teacher_id: &AccountId,
        action: ReviewAction,
    ) -> Result<TeacherRecord, ReviewError> {
        let target = action.target();
        let rejection_reason = match action {
            ReviewAction::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(ReviewError::MissingReason);
                }
                Some(reason.to_string())
            }
            ReviewAction::StartReview | ReviewAction::Approve => None,
        };

        let change = StatusChange {
            allowed_from: target.sources(),
            to: target,
            rejection_reason,
            at: Utc::now(),
        };

        let record = self
            .repository
            .transition(teacher_id, change)
            .map_err(|error| match error {
                RepositoryError::NotFound => ReviewError::NotFound(teacher_id.clone()),
                RepositoryError::StatusMismatch { current } => {
                    ReviewError::InvalidTransition { current, target }
                }
                other => ReviewError::Repository(other),
            })?;

        info!(%teacher_id, status = %record.status, "application status changed");
        Ok(record)
    }

    pub fn start_review(&self, teacher_id: &AccountId) -> Result<TeacherRecord, ReviewError> {
        self.apply(teacher_id, ReviewAction::StartReview)
    }

    pub fn approve(&self, teacher_id: &AccountId) -> Result<TeacherRecord, ReviewError> {
        self.apply(teacher_id, ReviewAction::Approve)
    }

    pub fn reject(
        &self,
        teacher_id: &AccountId,
        reason: &str,
    ) -> Result<TeacherRecord, ReviewError> {
        self.apply(
            teacher_id,
            ReviewAction::Reject {
                reason: reason.to_string(),
            },
        )
    }
}
