//! Stateless session credentials.
//!
//! A session is an HS256 JWT carrying the identity id (`sub`), email, role,
//! issuer and issue/expiry times. Nothing is stored server-side, so a token
//! stays valid until it expires.

pub mod jwt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::otp::models::{Identity, Role};

pub use jwt::SessionError;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_ISSUER: &str = "ballot";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct SessionIssuer {
    secret: SecretString,
    ttl: Duration,
    issuer: String,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl: DEFAULT_SESSION_TTL,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `identity`, valid from `now` for the configured TTL.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or the secret is unusable.
    pub fn mint(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, SessionError> {
        let iat = now.timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            sub: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            iss: self.issuer.clone(),
            iat,
            exp: iat.saturating_add(ttl),
        };
        jwt::sign_hs256(self.secret.expose_secret().as_bytes(), &claims)
    }

    /// Verify signature, issuer and expiry.
    ///
    /// # Errors
    /// Returns the first failing check.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let claims: SessionClaims =
            jwt::verify_hs256(self.secret.expose_secret().as_bytes(), token)?;
        if claims.iss != self.issuer {
            return Err(SessionError::InvalidIssuer);
        }
        if claims.exp <= now.timestamp() {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }
}
