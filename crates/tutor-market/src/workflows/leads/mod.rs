//! Parent lead capture. Shares the email duplicate contract with teacher intake but has
//! no account or document lifecycle.

pub mod router;
pub mod service;

pub use router::lead_router;
pub use service::{
    Lead, LeadError, LeadId, LeadRepository, LeadRepositoryError, LeadService, LeadSubmission,
    NewLead,
};
