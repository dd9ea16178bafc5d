use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::domain::{
    AccountId, ApplicationStep, ApplicationStepName, Profile, ProfileRole, TeacherRecord,
    TeacherStatus, ValidatedApplication,
};
use super::repository::{RepositoryError, TeacherRepository};

/// Rows written for every accepted application, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionStep {
    Profile,
    TeacherRecord,
    ApplicationSteps,
}

impl CompositionStep {
    pub const fn label(self) -> &'static str {
        match self {
            CompositionStep::Profile => "profile",
            CompositionStep::TeacherRecord => "teacher record",
            CompositionStep::ApplicationSteps => "application steps",
        }
    }
}

impl fmt::Display for CompositionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure policy for one composition step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    pub step: CompositionStep,
    pub fatal: bool,
}

/// Profile and teacher record back every later read path; the step ledger is advisory.
pub const COMPOSITION_POLICY: [StepPolicy; 3] = [
    StepPolicy {
        step: CompositionStep::Profile,
        fatal: true,
    },
    StepPolicy {
        step: CompositionStep::TeacherRecord,
        fatal: true,
    },
    StepPolicy {
        step: CompositionStep::ApplicationSteps,
        fatal: false,
    },
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to create {step}: {source}")]
pub struct CompositionError {
    pub step: CompositionStep,
    pub source: RepositoryError,
}

/// Non-fatal step that was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedStep {
    pub step: CompositionStep,
    pub error: RepositoryError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedRecords {
    pub profile: Profile,
    pub teacher: TeacherRecord,
    pub skipped: Vec<SkippedStep>,
}

#[derive(Default)]
struct Draft {
    profile: Option<Profile>,
    teacher: Option<TeacherRecord>,
}

/// Writes the intake rows by walking [`COMPOSITION_POLICY`].
pub struct RecordComposer<R> {
    repository: Arc<R>,
    policy: &'static [StepPolicy],
}

impl<R: TeacherRepository> RecordComposer<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            policy: &COMPOSITION_POLICY,
        }
    }

    pub fn policy(&self) -> &'static [StepPolicy] {
        self.policy
    }

    pub fn compose(
        &self,
        account_id: &AccountId,
        application: &ValidatedApplication,
        now: DateTime<Utc>,
    ) -> Result<ComposedRecords, CompositionError> {
        let mut draft = Draft::default();
        let mut skipped = Vec::new();

        for policy in self.policy {
            let result = self.run_step(policy.step, account_id, application, now, &mut draft);
            match result {
                Ok(()) => {}
                Err(source) if policy.fatal => {
                    return Err(CompositionError {
                        step: policy.step,
                        source,
                    });
                }
                Err(error) => {
                    warn!(
                        %account_id,
                        step = policy.step.label(),
                        %error,
                        "non-fatal composition step failed; continuing"
                    );
                    skipped.push(SkippedStep {
                        step: policy.step,
                        error,
                    });
                }
            }
        }

        match (draft.profile, draft.teacher) {
            (Some(profile), Some(teacher)) => Ok(ComposedRecords {
                profile,
                teacher,
                skipped,
            }),
            (None, _) => Err(CompositionError {
                step: CompositionStep::Profile,
                source: RepositoryError::NotFound,
            }),
            (Some(_), None) => Err(CompositionError {
                step: CompositionStep::TeacherRecord,
                source: RepositoryError::NotFound,
            }),
        }
    }

    fn run_step(
        &self,
        step: CompositionStep,
        account_id: &AccountId,
        application: &ValidatedApplication,
        now: DateTime<Utc>,
        draft: &mut Draft,
    ) -> Result<(), RepositoryError> {
        match step {
            CompositionStep::Profile => {
                let profile = self
                    .repository
                    .insert_profile(build_profile(account_id, application, now))?;
                draft.profile = Some(profile);
            }
            CompositionStep::TeacherRecord => {
                if draft.profile.is_none() {
                    return Err(RepositoryError::NotFound);
                }
                let teacher = self
                    .repository
                    .insert_teacher(build_teacher(account_id, application, now))?;
                draft.teacher = Some(teacher);
            }
            CompositionStep::ApplicationSteps => {
                self.repository.insert_steps(build_steps(account_id, now))?;
            }
        }
        Ok(())
    }
}

fn build_profile(
    account_id: &AccountId,
    application: &ValidatedApplication,
    now: DateTime<Utc>,
) -> Profile {
    Profile {
        id: account_id.clone(),
        role: ProfileRole::Teacher,
        full_name: application.identity.full_name.clone(),
        email: application.identity.email.clone(),
        phone: application.identity.phone.clone(),
        location: application.details.location.clone(),
        created_at: now,
    }
}

fn build_teacher(
    account_id: &AccountId,
    application: &ValidatedApplication,
    now: DateTime<Utc>,
) -> TeacherRecord {
    let details = &application.details;
    TeacherRecord {
        id: account_id.clone(),
        full_name: application.identity.full_name.clone(),
        email: application.identity.email.clone(),
        phone: details.phone.clone(),
        location: details.location.clone(),
        subjects: details.subjects.clone(),
        curricula: details.curricula.clone(),
        grade_levels: details.grade_levels.clone(),
        experience_years: details.experience_years,
        education_background: details.education_background.clone(),
        teaching_philosophy: details.teaching_philosophy.clone(),
        availability: details.availability.clone(),
        hourly_rate_range: details.hourly_rate_range.clone(),
        tsc_number: details.tsc_number.clone(),
        status: TeacherStatus::Submitted,
        rejection_reason: None,
        created_at: now,
        reviewed_at: None,
    }
}

fn build_steps(account_id: &AccountId, now: DateTime<Utc>) -> Vec<ApplicationStep> {
    ApplicationStepName::ALL
        .into_iter()
        .map(|step_name| ApplicationStep {
            teacher_id: account_id.clone(),
            step_name,
            is_completed: true,
            completed_at: Some(now),
        })
        .collect()
}
