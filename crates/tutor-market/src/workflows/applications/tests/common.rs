use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::config::default_request_limit;
use crate::workflows::applications::domain::{
    Account, AccountId, ApplicationStep, DocumentKind, DocumentRecord, DocumentUpload,
    NewAccount, Profile, TeacherApplicationSubmission, TeacherRecord, TeacherStatus,
};
use crate::workflows::applications::gateways::{
    DocumentStore, IdentityError, IdentityProvider, StorageError, StoredDocument,
};
use crate::workflows::applications::repository::{
    RepositoryError, StatusChange, TeacherRepository,
};
use crate::workflows::applications::service::{IntakeSettings, TeacherApplicationService};

pub(super) type MemoryService =
    TeacherApplicationService<MemoryRepository, MemoryIdentity, MemoryStore>;

pub(super) fn timestamp(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn upload(file_name: &str, mime_type: Option<&str>, content: &[u8]) -> DocumentUpload {
    DocumentUpload {
        file_name: file_name.to_string(),
        mime_type: mime_type.map(str::to_string),
        content: content.to_vec(),
    }
}

pub(super) fn submission() -> TeacherApplicationSubmission {
    TeacherApplicationSubmission {
        full_name: "Achieng Otieno".to_string(),
        email: "Achieng.Otieno@Example.com".to_string(),
        phone: Some("+254700111222".to_string()),
        location: Some("Nairobi".to_string()),
        gender: Some("female".to_string()),
        date_of_birth: NaiveDate::from_ymd_opt(1991, 6, 14),
        subjects: vec!["Mathematics".to_string(), "Physics".to_string()],
        curricula: vec!["CBC".to_string(), "IGCSE".to_string()],
        grade_levels: vec!["Grade 7".to_string(), "Form 2".to_string()],
        experience_years: Some(8),
        education_background: Some("BEd Science, Kenyatta University".to_string()),
        teaching_philosophy: Some("Every learner can reason from first principles.".to_string()),
        availability: vec!["weekday_evenings".to_string(), "saturday".to_string()],
        hourly_rate_range: Some("1500-2000".to_string()),
        tsc_number: Some("TSC-448812".to_string()),
        documents: BTreeMap::new(),
    }
}

pub(super) fn submission_with_documents() -> TeacherApplicationSubmission {
    let mut submission = submission();
    submission.documents.insert(
        DocumentKind::Cv,
        upload("cv.pdf", Some("application/pdf"), b"%PDF-1.7 curriculum vitae"),
    );
    submission.documents.insert(
        DocumentKind::ProfilePhoto,
        upload("portrait.jpg", None, b"\xff\xd8\xff\xe0 jpeg bytes"),
    );
    submission.documents.insert(
        DocumentKind::TscCertificate,
        upload("tsc.pdf", Some("application/pdf"), b"%PDF-1.7 tsc certificate"),
    );
    submission
}

pub(super) fn teacher_record(id: &str, email: &str, created_at: DateTime<Utc>) -> TeacherRecord {
    TeacherRecord {
        id: AccountId(id.to_string()),
        full_name: "Existing Teacher".to_string(),
        email: email.to_string(),
        phone: None,
        location: None,
        subjects: vec!["English".to_string()],
        curricula: vec!["8-4-4".to_string()],
        grade_levels: Vec::new(),
        experience_years: Some(3),
        education_background: None,
        teaching_philosophy: None,
        availability: Vec::new(),
        hourly_rate_range: None,
        tsc_number: None,
        status: TeacherStatus::Submitted,
        rejection_reason: None,
        created_at,
        reviewed_at: None,
    }
}

pub(super) fn account(id: &str, email: &str, full_name: Option<&str>) -> Account {
    let mut metadata = Map::new();
    if let Some(name) = full_name {
        metadata.insert("full_name".to_string(), Value::from(name));
    }
    Account {
        id: AccountId(id.to_string()),
        email: email.to_string(),
        metadata,
        created_at: timestamp(1),
    }
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<MemoryRepository>,
    Arc<MemoryIdentity>,
    Arc<MemoryStore>,
) {
    build_service_with(
        MemoryRepository::default(),
        MemoryIdentity::default(),
        MemoryStore::default(),
    )
}

pub(super) fn build_service_with(
    repository: MemoryRepository,
    identity: MemoryIdentity,
    store: MemoryStore,
) -> (
    MemoryService,
    Arc<MemoryRepository>,
    Arc<MemoryIdentity>,
    Arc<MemoryStore>,
) {
    let settings = IntakeSettings {
        provider_page_size: 2,
        provider_max_pages: 3,
        max_document_bytes: 1024,
        max_request_bytes: default_request_limit(1024),
        dashboard_url: "/dashboard/teacher".to_string(),
    };
    build_service_with_settings(repository, identity, store, settings)
}

pub(super) fn build_service_with_settings(
    repository: MemoryRepository,
    identity: MemoryIdentity,
    store: MemoryStore,
    settings: IntakeSettings,
) -> (
    MemoryService,
    Arc<MemoryRepository>,
    Arc<MemoryIdentity>,
    Arc<MemoryStore>,
) {
    let repository = Arc::new(repository);
    let identity = Arc::new(identity);
    let store = Arc::new(store);
    let service = TeacherApplicationService::new(
        repository.clone(),
        identity.clone(),
        store.clone(),
        settings,
    );
    (service, repository, identity, store)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Repository faults toggled per test.
#[derive(Debug, Default, Clone)]
pub(super) struct RepositoryFaults {
    pub(super) profile: bool,
    pub(super) teacher: bool,
    pub(super) steps: bool,
    pub(super) documents: bool,
    pub(super) lookup: bool,
    /// Skip the email lookup so a racing writer reaches the unique constraint.
    pub(super) blind_lookup: bool,
}

#[derive(Default)]
struct RepositoryState {
    profiles: Vec<Profile>,
    teachers: Vec<TeacherRecord>,
    steps: Vec<ApplicationStep>,
    documents: Vec<DocumentRecord>,
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    state: Mutex<RepositoryState>,
    faults: RepositoryFaults,
}

impl MemoryRepository {
    pub(super) fn with_faults(faults: RepositoryFaults) -> Self {
        Self {
            state: Mutex::default(),
            faults,
        }
    }

    pub(super) fn seed(&self, record: TeacherRecord) {
        self.state
            .lock()
            .expect("repository mutex poisoned")
            .teachers
            .push(record);
    }

    pub(super) fn profiles(&self) -> Vec<Profile> {
        self.state
            .lock()
            .expect("repository mutex poisoned")
            .profiles
            .clone()
    }

    pub(super) fn all_documents(&self) -> Vec<DocumentRecord> {
        self.state
            .lock()
            .expect("repository mutex poisoned")
            .documents
            .clone()
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl TeacherRepository for MemoryRepository {
    fn insert_profile(&self, profile: Profile) -> Result<Profile, RepositoryError> {
        if self.faults.profile {
            return Err(offline());
        }
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.profiles.push(profile.clone());
        Ok(profile)
    }

    fn insert_teacher(&self, record: TeacherRecord) -> Result<TeacherRecord, RepositoryError> {
        if self.faults.teacher {
            return Err(offline());
        }
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state
            .teachers
            .iter()
            .any(|existing| existing.email == record.email)
        {
            return Err(RepositoryError::Conflict);
        }
        state.teachers.push(record.clone());
        Ok(record)
    }

    fn insert_steps(&self, steps: Vec<ApplicationStep>) -> Result<(), RepositoryError> {
        if self.faults.steps {
            return Err(offline());
        }
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.steps.extend(steps);
        Ok(())
    }

    fn insert_document(&self, document: DocumentRecord) -> Result<DocumentRecord, RepositoryError> {
        if self.faults.documents {
            return Err(offline());
        }
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.documents.push(document.clone());
        Ok(document)
    }

    fn find_by_email(&self, email: &str) -> Result<Vec<TeacherRecord>, RepositoryError> {
        if self.faults.lookup {
            return Err(offline());
        }
        if self.faults.blind_lookup {
            return Ok(Vec::new());
        }
        let state = self.state.lock().expect("repository mutex poisoned");
        let mut matches: Vec<_> = state
            .teachers
            .iter()
            .filter(|record| record.email == email)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    fn fetch(&self, id: &AccountId) -> Result<Option<TeacherRecord>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.teachers.iter().find(|record| &record.id == id).cloned())
    }

    fn list(&self, status: Option<TeacherStatus>) -> Result<Vec<TeacherRecord>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = state
            .teachers
            .iter()
            .filter(|record| status.map_or(true, |status| record.status == status))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn documents(&self, id: &AccountId) -> Result<Vec<DocumentRecord>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .documents
            .iter()
            .filter(|document| &document.teacher_id == id)
            .cloned()
            .collect())
    }

    fn steps(&self, id: &AccountId) -> Result<Vec<ApplicationStep>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .steps
            .iter()
            .filter(|step| &step.teacher_id == id)
            .cloned()
            .collect())
    }

    fn transition(
        &self,
        id: &AccountId,
        change: StatusChange,
    ) -> Result<TeacherRecord, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let record = state
            .teachers
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if !change.allowed_from.contains(&record.status) {
            return Err(RepositoryError::StatusMismatch {
                current: record.status,
            });
        }
        record.status = change.to;
        record.rejection_reason = change.rejection_reason;
        record.reviewed_at = Some(change.at);
        Ok(record.clone())
    }
}

#[derive(Debug, Default, Clone)]
pub(super) struct IdentityFaults {
    pub(super) create: bool,
    /// Report `AlreadyExists` for every create, as if another request won the race.
    pub(super) create_conflicts: bool,
    pub(super) listing: bool,
    pub(super) metadata: bool,
    pub(super) sign_in: bool,
}

#[derive(Default)]
struct IdentityState {
    accounts: Vec<Account>,
    pages_requested: Vec<u32>,
    sign_in_links: Vec<(String, String)>,
}

#[derive(Default)]
pub(super) struct MemoryIdentity {
    state: Mutex<IdentityState>,
    faults: IdentityFaults,
}

impl MemoryIdentity {
    pub(super) fn with_faults(faults: IdentityFaults) -> Self {
        Self {
            state: Mutex::default(),
            faults,
        }
    }

    pub(super) fn with_accounts(accounts: Vec<Account>) -> Self {
        let identity = Self::default();
        identity.state.lock().expect("identity mutex poisoned").accounts = accounts;
        identity
    }

    pub(super) fn accounts(&self) -> Vec<Account> {
        self.state
            .lock()
            .expect("identity mutex poisoned")
            .accounts
            .clone()
    }

    pub(super) fn pages_requested(&self) -> Vec<u32> {
        self.state
            .lock()
            .expect("identity mutex poisoned")
            .pages_requested
            .clone()
    }

    pub(super) fn sign_in_links(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .expect("identity mutex poisoned")
            .sign_in_links
            .clone()
    }
}

impl IdentityProvider for MemoryIdentity {
    fn create_account(&self, request: NewAccount) -> Result<Account, IdentityError> {
        if self.faults.create {
            return Err(IdentityError::Unavailable("auth offline".to_string()));
        }
        if self.faults.create_conflicts {
            return Err(IdentityError::AlreadyExists);
        }
        let mut state = self.state.lock().expect("identity mutex poisoned");
        if state
            .accounts
            .iter()
            .any(|account| account.email.eq_ignore_ascii_case(&request.email))
        {
            return Err(IdentityError::AlreadyExists);
        }
        let account = Account {
            id: AccountId(format!("acct-{:03}", state.accounts.len() + 1)),
            email: request.email,
            metadata: request.metadata,
            created_at: timestamp(10) + Duration::minutes(state.accounts.len() as i64),
        };
        state.accounts.push(account.clone());
        Ok(account)
    }

    fn list_accounts(&self, page: u32, per_page: u32) -> Result<Vec<Account>, IdentityError> {
        let mut state = self.state.lock().expect("identity mutex poisoned");
        state.pages_requested.push(page);
        if self.faults.listing {
            return Err(IdentityError::Unavailable("auth offline".to_string()));
        }
        let start = (page.saturating_sub(1) * per_page) as usize;
        Ok(state
            .accounts
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    fn update_account_metadata(
        &self,
        id: &AccountId,
        patch: Map<String, Value>,
    ) -> Result<(), IdentityError> {
        if self.faults.metadata {
            return Err(IdentityError::Unavailable("auth offline".to_string()));
        }
        let mut state = self.state.lock().expect("identity mutex poisoned");
        let account = state
            .accounts
            .iter_mut()
            .find(|account| &account.id == id)
            .ok_or(IdentityError::NotFound)?;
        account.metadata.extend(patch);
        Ok(())
    }

    fn issue_sign_in_link(&self, email: &str, redirect_to: &str) -> Result<(), IdentityError> {
        if self.faults.sign_in {
            return Err(IdentityError::Unavailable("mailer offline".to_string()));
        }
        self.state
            .lock()
            .expect("identity mutex poisoned")
            .sign_in_links
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    failing: Vec<DocumentKind>,
    uploads: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub(super) fn failing_for(kinds: Vec<DocumentKind>) -> Self {
        Self {
            failing: kinds,
            uploads: Mutex::default(),
        }
    }

    pub(super) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().expect("store mutex poisoned").clone()
    }
}

impl DocumentStore for MemoryStore {
    fn put(
        &self,
        upload: &DocumentUpload,
        owner: &AccountId,
        kind: &DocumentKind,
    ) -> Result<StoredDocument, StorageError> {
        if self.failing.contains(kind) {
            return Err(StorageError::Unavailable("bucket offline".to_string()));
        }
        let path = format!("teacher-documents/{owner}/{kind}/{}", upload.file_name);
        self.uploads
            .lock()
            .expect("store mutex poisoned")
            .push(path.clone());
        Ok(StoredDocument { path })
    }
}
