//! Outbound collaborators owned by other systems: the identity provider and the
//! document blob store.

use serde_json::{Map, Value};

use super::domain::{Account, AccountId, DocumentKind, DocumentUpload, NewAccount};

/// Account directory of the authentication provider.
pub trait IdentityProvider: Send + Sync {
    fn create_account(&self, account: NewAccount) -> Result<Account, IdentityError>;
    /// One page of accounts; pages are numbered from 1.
    fn list_accounts(&self, page: u32, per_page: u32) -> Result<Vec<Account>, IdentityError>;
    /// Merge `patch` into the account metadata.
    fn update_account_metadata(
        &self,
        id: &AccountId,
        patch: Map<String, Value>,
    ) -> Result<(), IdentityError>;
    /// Send a single-use sign-in link that lands on `redirect_to`.
    fn issue_sign_in_link(&self, email: &str, redirect_to: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("an account with this email already exists")]
    AlreadyExists,
    #[error("account not found")]
    NotFound,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Blob storage keyed by owner and document kind.
pub trait DocumentStore: Send + Sync {
    fn put(
        &self,
        upload: &DocumentUpload,
        owner: &AccountId,
        kind: &DocumentKind,
    ) -> Result<StoredDocument, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}
