//! Teacher application intake and staff review.
//!
//! Intake runs as one sequential pipeline per request: validation, duplicate check,
//! account provisioning, record composition, document ingestion, and the sign-in
//! notification. Only the stages up to and including the teacher record are fatal; the
//! rest are logged and never change the applicant-facing result.

pub mod composer;
pub mod dedup;
pub mod documents;
pub mod domain;
pub mod gateways;
pub mod notification;
pub mod provisioning;
pub mod repository;
pub mod review;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use composer::{CompositionError, CompositionStep, StepPolicy, COMPOSITION_POLICY};
pub use dedup::{
    DuplicateApplication, DuplicateChecker, DuplicateOptions, ExistingApplicationView,
    ExistingIdentity,
};
pub use documents::{DocumentFailure, DocumentOutcome, DocumentReport, PROFILE_PHOTO_METADATA_KEY};
pub use domain::{
    Account, AccountId, ApplicantIdentity, ApplicationStep, ApplicationStepName, DocumentKind,
    DocumentRecord, DocumentUpload, NewAccount, Profile, ProfileRole,
    TeacherApplicationSubmission, TeacherRecord, TeacherStatus, ValidatedApplication,
};
pub use gateways::{DocumentStore, IdentityError, IdentityProvider, StorageError, StoredDocument};
pub use repository::{ApplicationDetail, RepositoryError, StatusChange, TeacherRepository};
pub use review::{ReviewAction, ReviewError, ReviewStateMachine};
pub use router::{application_router, StaffAccess};
pub use service::{IntakeError, IntakeReceipt, IntakeSettings, TeacherApplicationService};
pub use validation::{normalize_email, ValidationError};
