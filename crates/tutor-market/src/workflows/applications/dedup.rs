use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::domain::{Account, AccountId, TeacherRecord, TeacherStatus};
use super::gateways::IdentityProvider;
use super::repository::{RepositoryError, TeacherRepository};

/// Evidence that an applicant identity is already known.
#[derive(Debug, Clone, PartialEq)]
pub enum ExistingIdentity {
    Application(TeacherRecord),
    Account(Account),
    /// The provider refused to create the account but neither store could locate it.
    Unresolved { email: String },
}

/// Looks an email up in the teacher store and in the identity provider's account listing.
pub struct DuplicateChecker<R, P> {
    repository: Arc<R>,
    identity: Arc<P>,
    page_size: u32,
    max_pages: u32,
}

impl<R, P> DuplicateChecker<R, P>
where
    R: TeacherRepository,
    P: IdentityProvider,
{
    pub fn new(repository: Arc<R>, identity: Arc<P>, page_size: u32, max_pages: u32) -> Self {
        Self {
            repository,
            identity,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    /// Both lookups always run. A teacher-store failure is returned; a provider failure is
    /// logged and treated as "no account found". A stored record wins over an account.
    pub fn check(&self, email: &str) -> Result<Option<ExistingIdentity>, RepositoryError> {
        let stored = self.repository.find_by_email(email);
        let account = self.scan_accounts(email);

        let latest = stored?
            .into_iter()
            .max_by_key(|record| record.created_at);

        Ok(latest
            .map(ExistingIdentity::Application)
            .or_else(|| account.map(ExistingIdentity::Account)))
    }

    fn scan_accounts(&self, email: &str) -> Option<Account> {
        for page in 1..=self.max_pages {
            let accounts = match self.identity.list_accounts(page, self.page_size) {
                Ok(accounts) => accounts,
                Err(err) => {
                    warn!(%email, page, error = %err, "identity provider scan failed");
                    return None;
                }
            };

            let last_page = accounts.len() < self.page_size as usize;
            if let Some(found) = accounts
                .into_iter()
                .find(|account| account.email.eq_ignore_ascii_case(email))
            {
                return Some(found);
            }
            if last_page {
                return None;
            }
        }

        warn!(
            %email,
            pages = self.max_pages,
            "identity provider scan stopped at the page limit"
        );
        None
    }
}

/// Payload returned to an applicant whose identity is already on file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateApplication {
    pub existing_application: ExistingApplicationView,
    pub options: DuplicateOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingApplicationView {
    pub id: Option<AccountId>,
    pub full_name: Option<String>,
    pub email: String,
    pub status: Option<TeacherStatus>,
    pub application_date: Option<DateTime<Utc>>,
}

/// Next steps offered to the applicant instead of a second application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateOptions {
    pub can_sign_in: bool,
    pub can_reset_password: bool,
    pub can_view_status: bool,
}

impl From<ExistingIdentity> for DuplicateApplication {
    fn from(existing: ExistingIdentity) -> Self {
        match existing {
            ExistingIdentity::Application(record) => Self {
                existing_application: ExistingApplicationView {
                    id: Some(record.id),
                    full_name: Some(record.full_name),
                    email: record.email,
                    status: Some(record.status),
                    application_date: Some(record.created_at),
                },
                options: DuplicateOptions {
                    can_sign_in: true,
                    can_reset_password: true,
                    can_view_status: true,
                },
            },
            ExistingIdentity::Account(account) => Self {
                existing_application: ExistingApplicationView {
                    full_name: account.full_name().map(str::to_string),
                    id: Some(account.id),
                    email: account.email,
                    status: None,
                    application_date: Some(account.created_at),
                },
                options: DuplicateOptions {
                    can_sign_in: true,
                    can_reset_password: true,
                    can_view_status: false,
                },
            },
            ExistingIdentity::Unresolved { email } => Self {
                existing_application: ExistingApplicationView {
                    id: None,
                    full_name: None,
                    email,
                    status: None,
                    application_date: None,
                },
                options: DuplicateOptions {
                    can_sign_in: true,
                    can_reset_password: true,
                    can_view_status: false,
                },
            },
        }
    }
}
