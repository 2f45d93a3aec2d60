//! Shared fixtures for handler tests.

use argon2::Params;
use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use std::sync::Arc;

use super::state::{AuthConfig, AuthState};
use crate::otp::{
    OtpService,
    clock::ManualClock,
    crypto::CodeHasher,
    notifier::MemoryNotifier,
    rate_limit::{RateLimiter, SlidingWindowLimiter},
    repo::MemoryIdentityStore,
};
use crate::session::SessionIssuer;

pub(super) const TEST_SECRET: &str = "handler-test-secret";

pub(super) fn auth_state() -> (Arc<AuthState>, Arc<MemoryNotifier>) {
    auth_state_with_limit(3)
}

pub(super) fn auth_state_with_limit(max: usize) -> (Arc<AuthState>, Arc<MemoryNotifier>) {
    let start = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let notifier = Arc::new(MemoryNotifier::new());
    let sessions = Arc::new(SessionIssuer::new(SecretString::from(TEST_SECRET)));
    let hasher = Params::new(8, 1, 1, None).map_or_else(|_| CodeHasher::default(), CodeHasher::new);

    let otp = OtpService::new(
        Arc::new(MemoryIdentityStore::new()),
        notifier.clone(),
        sessions,
    )
    .with_clock(clock.clone())
    .with_hasher(hasher);

    let limiter: Arc<dyn RateLimiter> =
        Arc::new(SlidingWindowLimiter::new(clock).with_max_requests(max));
    let config = AuthConfig::new("https://ballot.dev".to_string());
    (
        Arc::new(AuthState::new(config, Arc::new(otp), limiter)),
        notifier,
    )
}
