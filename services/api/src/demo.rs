use crate::infra::{InMemoryDocumentStore, InMemoryIdentityProvider, InMemoryTeacherRepository};
use clap::Args;
use std::collections::BTreeMap;
use std::sync::Arc;
use tutor_market::error::AppError;
use tutor_market::workflows::applications::{
    DocumentKind, DocumentUpload, IntakeError, IntakeSettings, TeacherApplicationService,
    TeacherApplicationSubmission, PROFILE_PHOTO_METADATA_KEY,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Applicant email used for the sample application
    #[arg(long)]
    pub(crate) email: Option<String>,
    /// Reject the application with this reason instead of approving it
    #[arg(long)]
    pub(crate) reject: Option<String>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let identity = Arc::new(InMemoryIdentityProvider::default());
    let store = Arc::new(InMemoryDocumentStore::default());
    let service = TeacherApplicationService::new(
        Arc::new(InMemoryTeacherRepository::default()),
        identity.clone(),
        store.clone(),
        IntakeSettings::default(),
    );

    let email = args
        .email
        .unwrap_or_else(|| "grace.wambui@example.com".to_string());
    println!("Teacher intake demo");

    let receipt = match service.submit(demo_submission(&email)) {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  Submission rejected: {}", err);
            return Ok(());
        }
    };
    println!(
        "- Received application {} for {} -> status {}",
        receipt.account_id, receipt.teacher.email, receipt.teacher.status
    );
    for record in receipt.documents.stored() {
        println!("    stored {} at {}", record.kind, record.file_path);
    }
    for (kind, failure) in receipt.documents.failures() {
        println!("    {} not stored: {}", kind, failure);
    }
    let missing = receipt.documents.missing_required();
    if !missing.is_empty() {
        let names: Vec<_> = missing.iter().map(DocumentKind::as_str).collect();
        println!("  Still required: {}", names.join(", "));
    }
    if let Some(photo) = identity
        .account(&receipt.account_id)
        .and_then(|account| account.metadata.get(PROFILE_PHOTO_METADATA_KEY).cloned())
    {
        println!("  Profile photo: {}", photo);
    }
    println!("  Sign-in link sent: {}", receipt.notification_sent);
    for link in identity.outbox() {
        println!("    link for {} -> {}", link.email, link.redirect_to);
    }
    println!("  Objects in store: {}", store.keys().len());

    match service.submit(demo_submission(&email.to_uppercase())) {
        Err(IntakeError::Duplicate(duplicate)) => {
            let payload = serde_json::to_string_pretty(&duplicate).unwrap_or_default();
            println!("- Resubmission flagged as duplicate:\n{}", payload);
        }
        Err(err) => println!("- Resubmission failed: {}", err),
        Ok(second) => println!("- Resubmission unexpectedly accepted as {}", second.account_id),
    }

    let teacher_id = receipt.account_id;
    let reviewed = service.start_review(&teacher_id)?;
    println!("- Review started -> status {}", reviewed.status);

    let decided = match args.reject {
        Some(reason) => service.reject(&teacher_id, &reason)?,
        None => service.approve(&teacher_id)?,
    };
    println!("- Decision recorded -> status {}", decided.status);
    if let Some(reason) = &decided.rejection_reason {
        println!("  Reason: {}", reason);
    }

    let detail = service.get(&teacher_id)?;
    println!(
        "  {} documents and {} steps on file",
        detail.documents.len(),
        detail.steps.len()
    );

    Ok(())
}

fn demo_submission(email: &str) -> TeacherApplicationSubmission {
    let mut documents = BTreeMap::new();
    documents.insert(
        DocumentKind::Cv,
        DocumentUpload {
            file_name: "grace-wambui-cv.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            content: b"%PDF-1.7 sample cv".to_vec(),
        },
    );
    documents.insert(
        DocumentKind::ProfilePhoto,
        DocumentUpload {
            file_name: "portrait".to_string(),
            mime_type: Some("image/jpeg".to_string()),
            content: vec![0xFF, 0xD8, 0xFF, 0xE0],
        },
    );

    TeacherApplicationSubmission {
        full_name: "Grace Wambui".to_string(),
        email: email.to_string(),
        phone: Some("+254 712 000 111".to_string()),
        location: Some("Nairobi".to_string()),
        subjects: vec!["Mathematics".to_string(), "Physics".to_string()],
        curricula: vec!["CBC".to_string(), "8-4-4".to_string()],
        grade_levels: vec!["Grade 7".to_string(), "Form 2".to_string()],
        experience_years: Some(6),
        availability: vec!["weekday_evenings".to_string()],
        hourly_rate_range: Some("1500-2500".to_string()),
        documents,
        ..TeacherApplicationSubmission::default()
    }
}
