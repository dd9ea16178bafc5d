use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier issued by the identity provider. Profiles and teacher records reuse it as
/// their primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Teacher application exactly as posted by the intake form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherApplicationSubmission {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub curricula: Vec<String>,
    #[serde(default)]
    pub grade_levels: Vec<String>,
    #[serde(default)]
    pub experience_years: Option<u8>,
    #[serde(default)]
    pub education_background: Option<String>,
    #[serde(default)]
    pub teaching_philosophy: Option<String>,
    #[serde(default)]
    pub availability: Vec<String>,
    #[serde(default)]
    pub hourly_rate_range: Option<String>,
    #[serde(default)]
    pub tsc_number: Option<String>,
    #[serde(default)]
    pub documents: BTreeMap<DocumentKind, DocumentUpload>,
}

/// Email-keyed identity used to detect repeat applicants. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantIdentity {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
}

/// Submission that passed validation; `details.email` is normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedApplication {
    pub identity: ApplicantIdentity,
    pub details: TeacherApplicationSubmission,
}

/// Supporting document categories accepted at intake.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentKind {
    Cv,
    ProfilePhoto,
    TscCertificate,
    EducationCertificate,
    IdDocument,
    ReferenceLetter,
    Other(String),
}

impl DocumentKind {
    /// Kinds every complete application is expected to carry.
    pub const REQUIRED: [DocumentKind; 4] = [
        DocumentKind::Cv,
        DocumentKind::ProfilePhoto,
        DocumentKind::TscCertificate,
        DocumentKind::EducationCertificate,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            DocumentKind::Cv => "cv",
            DocumentKind::ProfilePhoto => "profilePhoto",
            DocumentKind::TscCertificate => "tscCertificate",
            DocumentKind::EducationCertificate => "educationCertificate",
            DocumentKind::IdDocument => "idDocument",
            DocumentKind::ReferenceLetter => "referenceLetter",
            DocumentKind::Other(kind) => kind,
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DocumentKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "cv" => DocumentKind::Cv,
            "profilePhoto" => DocumentKind::ProfilePhoto,
            "tscCertificate" => DocumentKind::TscCertificate,
            "educationCertificate" => DocumentKind::EducationCertificate,
            "idDocument" => DocumentKind::IdDocument,
            "referenceLetter" => DocumentKind::ReferenceLetter,
            _ => DocumentKind::Other(value),
        }
    }
}

impl From<DocumentKind> for String {
    fn from(value: DocumentKind) -> Self {
        match value {
            DocumentKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

/// File attached to the intake request. Content travels base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpload {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(with = "base64_content")]
    pub content: Vec<u8>,
}

mod base64_content {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(content: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(content))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD
            .decode(raw.trim())
            .map_err(serde::de::Error::custom)
    }
}

/// Identity-provider account. The platform only keeps `id` as a foreign reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn full_name(&self) -> Option<&str> {
        self.metadata.get("full_name").and_then(Value::as_str)
    }
}

/// Account creation request sent to the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub email: String,
    pub email_confirmed: bool,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    Teacher,
    Parent,
    Staff,
}

/// Platform-side mirror of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: AccountId,
    pub role: ProfileRole,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Review status of a teacher application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeacherStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl TeacherStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TeacherStatus::Submitted => "submitted",
            TeacherStatus::UnderReview => "under_review",
            TeacherStatus::Approved => "approved",
            TeacherStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, TeacherStatus::Approved | TeacherStatus::Rejected)
    }

    /// States from which a transition into `self` is legal.
    pub const fn sources(self) -> &'static [TeacherStatus] {
        match self {
            TeacherStatus::Submitted => &[],
            TeacherStatus::UnderReview => &[TeacherStatus::Submitted],
            TeacherStatus::Approved | TeacherStatus::Rejected => {
                &[TeacherStatus::Submitted, TeacherStatus::UnderReview]
            }
        }
    }

    pub fn can_transition_to(self, target: TeacherStatus) -> bool {
        target.sources().contains(&self)
    }
}

impl fmt::Display for TeacherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Application aggregate carrying the review status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub subjects: Vec<String>,
    pub curricula: Vec<String>,
    pub grade_levels: Vec<String>,
    pub experience_years: Option<u8>,
    pub education_background: Option<String>,
    pub teaching_philosophy: Option<String>,
    pub availability: Vec<String>,
    pub hourly_rate_range: Option<String>,
    pub tsc_number: Option<String>,
    pub status: TeacherStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Fixed progress-ledger step names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStepName {
    PersonalInfo,
    ProfessionalInfo,
    Documents,
    Review,
}

impl ApplicationStepName {
    pub const ALL: [ApplicationStepName; 4] = [
        ApplicationStepName::PersonalInfo,
        ApplicationStepName::ProfessionalInfo,
        ApplicationStepName::Documents,
        ApplicationStepName::Review,
    ];
}

/// Advisory progress row; its absence never blocks a submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStep {
    pub teacher_id: AccountId,
    pub step_name: ApplicationStepName,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Registered supporting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub teacher_id: AccountId,
    pub kind: DocumentKind,
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: String,
    pub is_required: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_kinds_round_trip_through_their_wire_names() {
        let kinds: BTreeMap<DocumentKind, u8> =
            serde_json::from_str(r#"{"cv":1,"profilePhoto":2,"portfolio":3}"#).expect("json");
        assert_eq!(kinds.get(&DocumentKind::Cv), Some(&1));
        assert_eq!(kinds.get(&DocumentKind::ProfilePhoto), Some(&2));
        assert_eq!(
            kinds.get(&DocumentKind::Other("portfolio".to_string())),
            Some(&3)
        );
    }

    #[test]
    fn required_kinds_match_the_fixed_set() {
        assert!(DocumentKind::Cv.is_required());
        assert!(DocumentKind::TscCertificate.is_required());
        assert!(!DocumentKind::ReferenceLetter.is_required());
        assert!(!DocumentKind::Other("portfolio".to_string()).is_required());
    }

    #[test]
    fn upload_content_is_base64_decoded() {
        let upload: DocumentUpload =
            serde_json::from_str(r#"{"fileName":"cv.pdf","content":"JVBERi0="}"#).expect("json");
        assert_eq!(upload.content, b"%PDF-".to_vec());
        assert!(upload.mime_type.is_none());
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for target in [
            TeacherStatus::Submitted,
            TeacherStatus::UnderReview,
            TeacherStatus::Approved,
            TeacherStatus::Rejected,
        ] {
            assert!(!TeacherStatus::Approved.can_transition_to(target));
            assert!(!TeacherStatus::Rejected.can_transition_to(target));
        }
        assert!(TeacherStatus::Submitted.can_transition_to(TeacherStatus::Approved));
        assert!(TeacherStatus::UnderReview.can_transition_to(TeacherStatus::Rejected));
        assert!(!TeacherStatus::UnderReview.can_transition_to(TeacherStatus::UnderReview));
    }
}
