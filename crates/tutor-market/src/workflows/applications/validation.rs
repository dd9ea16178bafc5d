use chrono::{NaiveDate, Utc};

use super::domain::{ApplicantIdentity, TeacherApplicationSubmission, ValidatedApplication};

const MAX_EXPERIENCE_YEARS: u8 = 60;

/// Field-level problems rejected before any intake stage runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("experienceYears must be at most 60 (found {0})")]
    ExperienceOutOfRange(u8),
    #[error("dateOfBirth {0} lies in the future")]
    FutureDateOfBirth(NaiveDate),
    #[error("{0} contains an empty entry")]
    EmptyListEntry(&'static str),
}

/// Normalise and check an email address; returns the lowercase form used as the dedup key.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_ascii_lowercase();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }

    let invalid = || ValidationError::InvalidEmail(raw.trim().to_string());
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);

    if well_formed {
        Ok(email)
    } else {
        Err(invalid())
    }
}

pub(crate) fn required_text(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn clean_list(values: Vec<String>, field: &'static str) -> Result<Vec<String>, ValidationError> {
    values
        .into_iter()
        .map(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ValidationError::EmptyListEntry(field))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

/// Check mandatory fields and normalise the submission into intake-ready form.
pub fn validate_submission(
    submission: TeacherApplicationSubmission,
) -> Result<ValidatedApplication, ValidationError> {
    let full_name = required_text(&submission.full_name, "fullName")?;
    let email = normalize_email(&submission.email)?;

    if let Some(years) = submission.experience_years {
        if years > MAX_EXPERIENCE_YEARS {
            return Err(ValidationError::ExperienceOutOfRange(years));
        }
    }

    if let Some(date_of_birth) = submission.date_of_birth {
        if date_of_birth > Utc::now().date_naive() {
            return Err(ValidationError::FutureDateOfBirth(date_of_birth));
        }
    }

    let details = TeacherApplicationSubmission {
        full_name: full_name.clone(),
        email: email.clone(),
        phone: optional_text(submission.phone),
        location: optional_text(submission.location),
        gender: optional_text(submission.gender),
        date_of_birth: submission.date_of_birth,
        subjects: clean_list(submission.subjects, "subjects")?,
        curricula: clean_list(submission.curricula, "curricula")?,
        grade_levels: clean_list(submission.grade_levels, "gradeLevels")?,
        experience_years: submission.experience_years,
        education_background: optional_text(submission.education_background),
        teaching_philosophy: optional_text(submission.teaching_philosophy),
        availability: clean_list(submission.availability, "availability")?,
        hourly_rate_range: optional_text(submission.hourly_rate_range),
        tsc_number: optional_text(submission.tsc_number),
        documents: submission.documents,
    };

    Ok(ValidatedApplication {
        identity: ApplicantIdentity {
            email,
            full_name,
            phone: details.phone.clone(),
        },
        details,
    })
}
