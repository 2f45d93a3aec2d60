//! Auth handlers and supporting modules.
//!
//! Passwordless login: `send-otp` mails a 6-digit code, `verify-otp` trades
//! it for a session token, `resend-otp` re-issues a code for a known email.
//! `me` and `profile` read and update the identity behind a bearer token.
//!
//! ## Rate Limiting
//!
//! `send-otp` and `resend-otp` share one sliding window per normalized email:
//! 3 requests per 15 minutes by default. The check runs after the email format
//! check and before any storage or hashing work, so invalid input never
//! consumes quota. A limited request gets `429` with the wait rounded up to
//! whole minutes and a `Retry-After` header in seconds.

mod error;
pub(crate) mod otp;
pub(crate) mod profile;
mod state;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};

#[cfg(test)]
mod test_support;
