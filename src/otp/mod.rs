pub mod bypass;
pub mod clock;
pub mod crypto;
pub mod models;
pub mod notifier;
pub mod rate_limit;
pub mod repo;
pub mod service;

use regex::Regex;

pub use service::{ErrorCategory, IssueOutcome, OtpError, OtpService, VerifiedLogin};

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}
