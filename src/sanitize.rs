//! Form input normalization.
//!
//! Every string that reaches storage or an external sink passes through here
//! first: trimmed, bounded in length, and (for the email) validated.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::AppError;
use crate::models::{LeadFields, RawLeadForm};

/// Upper bound on any single form field, in characters.
pub const MAX_FIELD_CHARS: usize = 1000;

/// `local@domain.tld`: no whitespace or extra `@` on either side, at least one dot after the `@`.
static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Trims whitespace and truncates to [`MAX_FIELD_CHARS`] characters.
/// Missing input becomes an empty string.
pub fn sanitize_string(raw: Option<&str>) -> String {
    match raw {
        Some(s) => s.trim().chars().take(MAX_FIELD_CHARS).collect(),
        None => String::new(),
    }
}

/// Trims and lower-cases an email address, rejecting anything that is not
/// shaped like `local@domain.tld`.
pub fn sanitize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();

    if !EMAIL_SHAPE.is_match(&email) {
        tracing::warn!("Rejected malformed email: {}", email);
        return Err(AppError::Validation("Invalid email format".to_string()));
    }

    Ok(email)
}

/// Validates and normalizes a raw form body.
///
/// Name and email are required; everything else defaults to an empty string.
pub fn sanitize_lead(raw: &RawLeadForm) -> Result<LeadFields, AppError> {
    let name = raw.name.as_deref().unwrap_or_default();
    let email = raw.email.as_deref().unwrap_or_default();

    if name.trim().is_empty() || email.trim().is_empty() {
        return Err(AppError::Validation(
            "Name and email are required".to_string(),
        ));
    }

    Ok(LeadFields {
        name: sanitize_string(Some(name)),
        email: sanitize_email(email)?,
        company: sanitize_string(raw.company.as_deref()),
        phone: sanitize_string(raw.phone.as_deref()),
        project_type: sanitize_string(raw.project_type.as_deref()),
        message: sanitize_string(raw.message.as_deref()),
    })
}
