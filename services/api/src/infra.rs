use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;
use tutor_market::workflows::applications::{
    Account, AccountId, ApplicationStep, DocumentKind, DocumentRecord, DocumentStore,
    DocumentUpload, IdentityError, IdentityProvider, NewAccount, Profile, RepositoryError,
    StatusChange, StorageError, StoredDocument, TeacherRecord, TeacherRepository, TeacherStatus,
};
use tutor_market::workflows::leads::{
    Lead, LeadId, LeadRepository, LeadRepositoryError, NewLead,
};
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct TeacherTables {
    profiles: HashMap<AccountId, Profile>,
    teachers: BTreeMap<AccountId, TeacherRecord>,
    steps: Vec<ApplicationStep>,
    documents: Vec<DocumentRecord>,
}

/// Process-local teacher store. Teacher email is unique, mirroring the production index.
#[derive(Default, Clone)]
pub(crate) struct InMemoryTeacherRepository {
    tables: Arc<Mutex<TeacherTables>>,
}

fn newest_first(records: &mut [TeacherRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl TeacherRepository for InMemoryTeacherRepository {
    fn insert_profile(&self, profile: Profile) -> Result<Profile, RepositoryError> {
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        if guard.profiles.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn insert_teacher(&self, record: TeacherRecord) -> Result<TeacherRecord, RepositoryError> {
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        let taken = guard.teachers.contains_key(&record.id)
            || guard
                .teachers
                .values()
                .any(|existing| existing.email == record.email);
        if taken {
            return Err(RepositoryError::Conflict);
        }
        guard.teachers.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn insert_steps(&self, steps: Vec<ApplicationStep>) -> Result<(), RepositoryError> {
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        guard.steps.extend(steps);
        Ok(())
    }

    fn insert_document(&self, document: DocumentRecord) -> Result<DocumentRecord, RepositoryError> {
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        if !guard.teachers.contains_key(&document.teacher_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.documents.push(document.clone());
        Ok(document)
    }

    fn find_by_email(&self, email: &str) -> Result<Vec<TeacherRecord>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = guard
            .teachers
            .values()
            .filter(|record| record.email == email)
            .cloned()
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    fn fetch(&self, id: &AccountId) -> Result<Option<TeacherRecord>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard.teachers.get(id).cloned())
    }

    fn list(&self, status: Option<TeacherStatus>) -> Result<Vec<TeacherRecord>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = guard
            .teachers
            .values()
            .filter(|record| status.map_or(true, |status| record.status == status))
            .cloned()
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    fn documents(&self, id: &AccountId) -> Result<Vec<DocumentRecord>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard
            .documents
            .iter()
            .filter(|document| &document.teacher_id == id)
            .cloned()
            .collect())
    }

    fn steps(&self, id: &AccountId) -> Result<Vec<ApplicationStep>, RepositoryError> {
        let guard = self.tables.lock().expect("repository mutex poisoned");
        Ok(guard
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
        let mut guard = self.tables.lock().expect("repository mutex poisoned");
        let record = guard.teachers.get_mut(id).ok_or(RepositoryError::NotFound)?;
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

/// Sign-in link that would have been emailed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IssuedLink {
    pub(crate) email: String,
    pub(crate) redirect_to: String,
}

#[derive(Default)]
struct Directory {
    accounts: Vec<Account>,
    outbox: Vec<IssuedLink>,
}

/// Stand-in for the hosted auth provider. Links are logged instead of mailed.
#[derive(Default, Clone)]
pub(crate) struct InMemoryIdentityProvider {
    directory: Arc<Mutex<Directory>>,
}

impl InMemoryIdentityProvider {
    pub(crate) fn account(&self, id: &AccountId) -> Option<Account> {
        let guard = self.directory.lock().expect("identity mutex poisoned");
        guard.accounts.iter().find(|account| &account.id == id).cloned()
    }

    pub(crate) fn outbox(&self) -> Vec<IssuedLink> {
        self.directory
            .lock()
            .expect("identity mutex poisoned")
            .outbox
            .clone()
    }
}

impl IdentityProvider for InMemoryIdentityProvider {
    fn create_account(&self, request: NewAccount) -> Result<Account, IdentityError> {
        let mut guard = self.directory.lock().expect("identity mutex poisoned");
        if guard
            .accounts
            .iter()
            .any(|account| account.email.eq_ignore_ascii_case(&request.email))
        {
            return Err(IdentityError::AlreadyExists);
        }
        let account = Account {
            id: AccountId(Uuid::new_v4().to_string()),
            email: request.email,
            metadata: request.metadata,
            created_at: Utc::now(),
        };
        guard.accounts.push(account.clone());
        Ok(account)
    }

    fn list_accounts(&self, page: u32, per_page: u32) -> Result<Vec<Account>, IdentityError> {
        let guard = self.directory.lock().expect("identity mutex poisoned");
        let skip = page.saturating_sub(1) as usize * per_page as usize;
        Ok(guard
            .accounts
            .iter()
            .skip(skip)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    fn update_account_metadata(
        &self,
        id: &AccountId,
        patch: Map<String, Value>,
    ) -> Result<(), IdentityError> {
        let mut guard = self.directory.lock().expect("identity mutex poisoned");
        let account = guard
            .accounts
            .iter_mut()
            .find(|account| &account.id == id)
            .ok_or(IdentityError::NotFound)?;
        account.metadata.extend(patch);
        Ok(())
    }

    fn issue_sign_in_link(&self, email: &str, redirect_to: &str) -> Result<(), IdentityError> {
        let mut guard = self.directory.lock().expect("identity mutex poisoned");
        if !guard
            .accounts
            .iter()
            .any(|account| account.email.eq_ignore_ascii_case(email))
        {
            return Err(IdentityError::NotFound);
        }
        info!(%email, %redirect_to, "sign-in link queued");
        guard.outbox.push(IssuedLink {
            email: email.to_string(),
            redirect_to: redirect_to.to_string(),
        });
        Ok(())
    }
}

fn sanitise_segment(raw: &str, keep: &[char]) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || keep.contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Object key `<owner>/<kind>/<file name>`. Kind and file name are reduced to safe characters.
fn object_key(upload: &DocumentUpload, owner: &AccountId, kind: &DocumentKind) -> String {
    let base = Path::new(upload.file_name.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    let mut file_name = sanitise_segment(base, &['.', '-', '_']);
    let mut kind = sanitise_segment(kind.as_str(), &['-', '_']);
    if kind.is_empty() {
        kind.push_str("other");
    }

    if Path::new(&file_name).extension().is_none() {
        let extension = upload
            .mime_type
            .as_deref()
            .and_then(mime_guess::get_mime_extensions_str)
            .and_then(|extensions| extensions.first());
        if let Some(extension) = extension {
            file_name.push('.');
            file_name.push_str(extension);
        }
    }

    format!("{owner}/{kind}/{file_name}")
}

/// Writes documents below `root`; the returned path is relative to it.
#[derive(Debug, Clone)]
pub(crate) struct FileSystemDocumentStore {
    root: PathBuf,
}

impl FileSystemDocumentStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentStore for FileSystemDocumentStore {
    fn put(
        &self,
        upload: &DocumentUpload,
        owner: &AccountId,
        kind: &DocumentKind,
    ) -> Result<StoredDocument, StorageError> {
        if owner.0.contains(['/', '\\']) || owner.0.starts_with('.') {
            return Err(StorageError::Rejected(format!("invalid owner id '{owner}'")));
        }

        let key = object_key(upload, owner, kind);
        let target = self.root.join(&key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| StorageError::Unavailable(err.to_string()))?;
        }
        fs::write(&target, &upload.content)
            .map_err(|err| StorageError::Unavailable(err.to_string()))?;

        Ok(StoredDocument { path: key })
    }
}

/// Document store kept in memory, used by the demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryDocumentStore {
    pub(crate) fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("document mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn put(
        &self,
        upload: &DocumentUpload,
        owner: &AccountId,
        kind: &DocumentKind,
    ) -> Result<StoredDocument, StorageError> {
        let key = object_key(upload, owner, kind);
        self.objects
            .lock()
            .expect("document mutex poisoned")
            .insert(key.clone(), upload.content.clone());
        Ok(StoredDocument { path: key })
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    leads: Arc<Mutex<Vec<Lead>>>,
    sequence: Arc<AtomicU64>,
}

impl LeadRepository for InMemoryLeadRepository {
    fn insert(&self, lead: NewLead) -> Result<Lead, LeadRepositoryError> {
        let mut guard = self.leads.lock().expect("lead mutex poisoned");
        if guard.iter().any(|existing| existing.email == lead.email) {
            return Err(LeadRepositoryError::Conflict);
        }
        let next = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let stored = Lead {
            id: LeadId(format!("lead-{next:06}")),
            parent_name: lead.parent_name,
            email: lead.email,
            phone: lead.phone,
            location: lead.location,
            subjects: lead.subjects,
            grade_level: lead.grade_level,
            notes: lead.notes,
            created_at: lead.created_at,
        };
        guard.push(stored.clone());
        Ok(stored)
    }

    fn find_by_email(&self, email: &str) -> Result<Vec<Lead>, LeadRepositoryError> {
        let guard = self.leads.lock().expect("lead mutex poisoned");
        let mut leads: Vec<_> = guard
            .iter()
            .filter(|lead| lead.email == email)
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }
}
