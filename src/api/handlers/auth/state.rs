//! Auth state and configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::otp::{
    OtpService,
    rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, RateLimiter},
    service::DEFAULT_CODE_TTL,
};
use crate::session::{DEFAULT_ISSUER, DEFAULT_SESSION_TTL};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    otp_ttl_seconds: u64,
    rate_limit_window_seconds: u64,
    rate_limit_max: usize,
    session_ttl_seconds: u64,
    session_issuer: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            otp_ttl_seconds: DEFAULT_CODE_TTL.as_secs(),
            rate_limit_window_seconds: DEFAULT_WINDOW.as_secs(),
            rate_limit_max: DEFAULT_MAX_REQUESTS,
            session_ttl_seconds: DEFAULT_SESSION_TTL.as_secs(),
            session_issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: u64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_max(mut self, max: usize) -> Self {
        self.rate_limit_max = max;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_issuer(mut self, issuer: String) -> Self {
        self.session_issuer = issuer;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_seconds)
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }

    #[must_use]
    pub fn rate_limit_max(&self) -> usize {
        self.rate_limit_max
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn session_issuer(&self) -> &str {
        &self.session_issuer
    }
}

pub struct AuthState {
    config: AuthConfig,
    otp: Arc<OtpService>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, otp: Arc<OtpService>, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            otp,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn otp(&self) -> &OtpService {
        &self.otp
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_otp_policy() {
        let config = AuthConfig::new("https://ballot.dev".to_string());
        assert_eq!(config.otp_ttl(), Duration::from_secs(600));
        assert_eq!(config.rate_limit_window(), Duration::from_secs(900));
        assert_eq!(config.rate_limit_max(), 3);
        assert_eq!(config.session_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.session_issuer(), "ballot");
        assert_eq!(config.frontend_base_url(), "https://ballot.dev");
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new("http://localhost:5173".to_string())
            .with_otp_ttl_seconds(60)
            .with_rate_limit_window_seconds(120)
            .with_rate_limit_max(5)
            .with_session_ttl_seconds(3600)
            .with_session_issuer("polls".to_string());
        assert_eq!(config.otp_ttl(), Duration::from_secs(60));
        assert_eq!(config.rate_limit_window(), Duration::from_secs(120));
        assert_eq!(config.rate_limit_max(), 5);
        assert_eq!(config.session_ttl(), Duration::from_secs(3600));
        assert_eq!(config.session_issuer(), "polls");
    }
}
