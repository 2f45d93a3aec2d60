//! # Ballot (passwordless authentication for polls)
//!
//! `ballot` proves that a voter controls an email address by mailing a
//! one-time code, then hands back a signed session credential the poll API
//! accepts on later requests.
//!
//! ## Flow
//!
//! 1. `POST /api/auth/send-otp` passes the per-email sliding window
//!    (3 requests per 15 minutes), stores an Argon2id hash of a fresh 6-digit
//!    code with a 10 minute expiry, and mails the code.
//! 2. `POST /api/auth/verify-otp` checks the code, clears it (single use),
//!    marks the identity verified and returns an HS256 session token valid
//!    for 7 days.
//! 3. `POST /api/auth/resend-otp` re-issues a code for a known email.
//!
//! Delivery failures never fail the request; the code stays valid and the
//! failure is logged.
//!
//! ## Storage
//!
//! Identity records live behind [`otp::repo::IdentityStore`]. Postgres is used
//! when a DSN is configured, otherwise an in-memory store keeps records for
//! the lifetime of the process.
//!
//! ## Rate limiting
//!
//! The request window is process-local. Running several instances loosens the
//! cap to "3 per instance per 15 minutes"; swap the
//! [`otp::rate_limit::RateLimiter`] implementation for a shared store in that
//! deployment.

pub mod api;
pub mod cli;
pub mod otp;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
