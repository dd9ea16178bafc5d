use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map};
use tracing::{info, warn};

use super::domain::{AccountId, DocumentKind, DocumentRecord, DocumentUpload};
use super::gateways::{DocumentStore, IdentityProvider, StorageError};
use super::repository::{RepositoryError, TeacherRepository};

/// Account metadata key that mirrors the stored profile photo path.
pub const PROFILE_PHOTO_METADATA_KEY: &str = "profile_photo_url";

/// Why a single document did not make it into the teacher's file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentFailure {
    #[error("unsupported document kind '{0}'")]
    UnsupportedKind(String),
    #[error("file name is missing")]
    MissingFileName,
    #[error("file is empty")]
    Empty,
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("unsupported content type '{0}'")]
    InvalidMimeType(String),
    #[error(transparent)]
    Upload(#[from] StorageError),
    #[error("uploaded to {path} but not registered: {source}")]
    Registration {
        path: String,
        source: RepositoryError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub kind: DocumentKind,
    pub result: Result<DocumentRecord, DocumentFailure>,
}

/// Per-kind result of one intake's document batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentReport {
    pub outcomes: Vec<DocumentOutcome>,
    /// Set when the profile photo path reached the account metadata.
    pub profile_photo_url: Option<String>,
}

impl DocumentReport {
    pub fn stored(&self) -> impl Iterator<Item = &DocumentRecord> + '_ {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&DocumentKind, &DocumentFailure)> + '_ {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(failure) => Some((&outcome.kind, failure)),
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Required kinds that were neither submitted nor stored.
    pub fn missing_required(&self) -> Vec<DocumentKind> {
        DocumentKind::REQUIRED
            .into_iter()
            .filter(|kind| !self.stored().any(|record| &record.kind == kind))
            .collect()
    }
}

/// Uploads and registers each submitted file on its own; one failure never stops the rest.
pub struct DocumentIngestor<R, P, S> {
    repository: Arc<R>,
    identity: Arc<P>,
    store: Arc<S>,
    max_document_bytes: u64,
}

impl<R, P, S> DocumentIngestor<R, P, S>
where
    R: TeacherRepository,
    P: IdentityProvider,
    S: DocumentStore,
{
    pub fn new(
        repository: Arc<R>,
        identity: Arc<P>,
        store: Arc<S>,
        max_document_bytes: u64,
    ) -> Self {
        Self {
            repository,
            identity,
            store,
            max_document_bytes,
        }
    }

    /// Must only run once the teacher record for `account_id` exists.
    pub fn ingest(
        &self,
        account_id: &AccountId,
        documents: &BTreeMap<DocumentKind, DocumentUpload>,
        now: DateTime<Utc>,
    ) -> DocumentReport {
        let mut report = DocumentReport::default();

        for (kind, upload) in documents {
            let result = self.ingest_one(account_id, kind, upload, now);
            if let Ok(record) = &result {
                if *kind == DocumentKind::ProfilePhoto {
                    report.profile_photo_url =
                        self.sync_profile_photo(account_id, &record.file_path);
                }
            }
            report.outcomes.push(DocumentOutcome {
                kind: kind.clone(),
                result,
            });
        }

        let failed = report.failures().count();
        if failed > 0 {
            for (kind, failure) in report.failures() {
                warn!(%account_id, %kind, %failure, "document ingestion failed");
            }
            warn!(
                %account_id,
                failed,
                stored = report.stored().count(),
                "partial document upload failure"
            );
        } else if !report.outcomes.is_empty() {
            info!(%account_id, stored = report.outcomes.len(), "documents ingested");
        }

        report
    }

    fn ingest_one(
        &self,
        account_id: &AccountId,
        kind: &DocumentKind,
        upload: &DocumentUpload,
        now: DateTime<Utc>,
    ) -> Result<DocumentRecord, DocumentFailure> {
        if !is_storable_kind(kind) {
            return Err(DocumentFailure::UnsupportedKind(kind.to_string()));
        }

        let file_name = upload.file_name.trim();
        if file_name.is_empty() {
            return Err(DocumentFailure::MissingFileName);
        }

        let size = upload.content.len() as u64;
        if size == 0 {
            return Err(DocumentFailure::Empty);
        }
        if size > self.max_document_bytes {
            return Err(DocumentFailure::TooLarge {
                size,
                limit: self.max_document_bytes,
            });
        }

        let mime_type = resolve_mime(kind, upload)?;
        let stored = self.store.put(upload, account_id, kind)?;

        let record = DocumentRecord {
            teacher_id: account_id.clone(),
            kind: kind.clone(),
            file_name: file_name.to_string(),
            file_path: stored.path.clone(),
            file_size: size,
            mime_type: mime_type.essence_str().to_string(),
            is_required: kind.is_required(),
            verified_at: None,
            uploaded_at: now,
        };

        self.repository
            .insert_document(record)
            .map_err(|source| DocumentFailure::Registration {
                path: stored.path,
                source,
            })
    }

    fn sync_profile_photo(&self, account_id: &AccountId, path: &str) -> Option<String> {
        let mut patch = Map::new();
        patch.insert(PROFILE_PHOTO_METADATA_KEY.to_string(), json!(path));

        match self.identity.update_account_metadata(account_id, patch) {
            Ok(()) => Some(path.to_string()),
            Err(error) => {
                warn!(%account_id, %error, "profile photo not mirrored to account metadata");
                None
            }
        }
    }
}

/// Kinds outside the fixed set become a storage path segment, so only plain slugs pass.
fn is_storable_kind(kind: &DocumentKind) -> bool {
    match kind {
        DocumentKind::Other(name) => {
            !name.is_empty()
                && name.len() <= 64
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        }
        _ => true,
    }
}

/// Declared content type, else a guess from the file name. Profile photos must be images.
fn resolve_mime(
    kind: &DocumentKind,
    upload: &DocumentUpload,
) -> Result<mime::Mime, DocumentFailure> {
    let mime_type = match upload.mime_type.as_deref().map(str::trim) {
        Some(declared) if !declared.is_empty() => declared
            .parse::<mime::Mime>()
            .map_err(|_| DocumentFailure::InvalidMimeType(declared.to_string()))?,
        _ => mime_guess::from_path(upload.file_name.trim()).first_or_octet_stream(),
    };

    if *kind == DocumentKind::ProfilePhoto && mime_type.type_() != mime::IMAGE {
        return Err(DocumentFailure::InvalidMimeType(
            mime_type.essence_str().to_string(),
        ));
    }

    Ok(mime_type)
}
