use anyhow::anyhow;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    bypass::{BypassPolicy, DisabledBypass},
    clock::{Clock, SystemClock},
    crypto::{self, CodeHasher},
    models::{Identity, IdentitySummary, OtpPurpose},
    normalize_email,
    notifier::{Notifier, mask_email},
    repo::IdentityStore,
    valid_email,
};
use crate::session::{SessionError, SessionIssuer};

pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(10 * 60);

/// Where an [`OtpError`] lands in the HTTP taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Authentication,
    Internal,
}

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("OTP must be a 6-digit number")]
    MalformedCode,
    #[error("Username is required")]
    InvalidDisplayName,
    #[error("User with this email already exists. Please login instead.")]
    AlreadyRegistered,
    #[error("User not found. Please request an OTP first.")]
    NotFound,
    #[error("No OTP found for this email. Please request a new OTP.")]
    NoPendingCode,
    #[error("OTP has expired. Please request a new one.")]
    Expired,
    #[error("Invalid OTP. Please try again.")]
    Mismatch,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OtpError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidEmail
            | Self::MalformedCode
            | Self::InvalidDisplayName
            | Self::AlreadyRegistered => ErrorCategory::Validation,
            Self::NotFound => ErrorCategory::NotFound,
            Self::NoPendingCode | Self::Expired | Self::Mismatch => ErrorCategory::Authentication,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl From<SessionError> for OtpError {
    fn from(err: SessionError) -> Self {
        Self::Internal(anyhow!("failed to mint session token: {err}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueOutcome {
    pub email: String,
    /// Seconds until the code expires.
    pub expires_in: u64,
    pub delivered: bool,
}

#[derive(Clone, Debug)]
pub struct VerifiedLogin {
    pub token: String,
    pub identity: Identity,
}

impl VerifiedLogin {
    #[must_use]
    pub fn summary(&self) -> IdentitySummary {
        self.identity.summary()
    }
}

/// Issues and verifies emailed one-time codes.
///
/// Rate limiting happens in front of this service; it only owns the code
/// lifecycle: generate, hash, store with expiry, deliver, then check and
/// consume on verification.
pub struct OtpService {
    store: Arc<dyn IdentityStore>,
    notifier: Arc<dyn Notifier>,
    sessions: Arc<SessionIssuer>,
    clock: Arc<dyn Clock>,
    bypass: Arc<dyn BypassPolicy>,
    hasher: CodeHasher,
    code_ttl: Duration,
}

impl OtpService {
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        notifier: Arc<dyn Notifier>,
        sessions: Arc<SessionIssuer>,
    ) -> Self {
        Self {
            store,
            notifier,
            sessions,
            clock: Arc::new(SystemClock),
            bypass: Arc::new(DisabledBypass),
            hasher: CodeHasher::default(),
            code_ttl: DEFAULT_CODE_TTL,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_bypass(mut self, bypass: Arc<dyn BypassPolicy>) -> Self {
        self.bypass = bypass;
        self
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: CodeHasher) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    #[must_use]
    pub fn code_ttl(&self) -> Duration {
        self.code_ttl
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionIssuer> {
        &self.sessions
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue a fresh code for `email`, replacing any pending one.
    ///
    /// A login request for an unknown email creates an unverified record.
    ///
    /// # Errors
    /// `InvalidEmail`, `AlreadyRegistered` for a register request on a known
    /// email, or `Internal` when hashing or storage fails. Delivery failures
    /// are logged and do not fail the call.
    #[instrument(skip(self, email), fields(email = %mask_email(email)))]
    pub async fn issue(&self, email: &str, purpose: OtpPurpose) -> Result<IssueOutcome, OtpError> {
        let email = checked_email(email)?;
        let existing = self.store.find_by_email(&email).await?;

        if purpose == OtpPurpose::Register && existing.is_some() {
            return Err(OtpError::AlreadyRegistered);
        }

        let identity = match existing {
            Some(identity) => identity,
            None => {
                debug!("creating unverified identity on first code request");
                Identity::new(email, self.clock.now())
            }
        };

        self.store_and_send(identity, purpose).await
    }

    /// Re-issue a code for an email that already requested one.
    ///
    /// # Errors
    /// `InvalidEmail`, `NotFound` for an unknown email, or `Internal`.
    #[instrument(skip(self, email), fields(email = %mask_email(email)))]
    pub async fn resend(&self, email: &str) -> Result<IssueOutcome, OtpError> {
        let email = checked_email(email)?;
        let identity = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(OtpError::NotFound)?;

        self.store_and_send(identity, OtpPurpose::Login).await
    }

    async fn store_and_send(
        &self,
        mut identity: Identity,
        purpose: OtpPurpose,
    ) -> Result<IssueOutcome, OtpError> {
        let code = crypto::generate_code();
        let now = self.clock.now();
        let ttl = ChronoDuration::from_std(self.code_ttl)
            .map_err(|err| anyhow!("invalid code ttl: {err}"))?;
        let hash = self.hasher.hash_blocking(code.clone()).await?;

        identity.set_pending_code(hash, now + ttl, now);
        let stored = self.store.save(&identity).await?;

        let delivered = match self.notifier.send_code(&stored.email, &code, purpose).await {
            Ok(_) => true,
            Err(err) => {
                warn!("one-time code delivery failed, code remains valid: {err:#}");
                false
            }
        };

        info!(?purpose, delivered, "one-time code issued");
        Ok(IssueOutcome {
            email: stored.email,
            expires_in: self.code_ttl.as_secs(),
            delivered,
        })
    }

    /// Check `code` for `email` and, on success, consume it and mint a session.
    ///
    /// Failed attempts leave the pending code untouched.
    ///
    /// # Errors
    /// `MalformedCode`, `NotFound`, `NoPendingCode`, `Expired`, `Mismatch`,
    /// or `Internal`.
    #[instrument(skip(self, email, code), fields(email = %mask_email(email)))]
    pub async fn verify(&self, email: &str, code: &str) -> Result<VerifiedLogin, OtpError> {
        if !crypto::is_well_formed(code) {
            return Err(OtpError::MalformedCode);
        }
        let email = normalize_email(email);
        let identity = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(OtpError::NotFound)?;
        let now = self.clock.now();

        let expected_hash = if self.bypass.allows(code) {
            warn!("master bypass code accepted");
            None
        } else {
            let Some(stored_hash) = identity.otp_hash.clone() else {
                return Err(OtpError::NoPendingCode);
            };
            if identity.otp_expired(now) {
                return Err(OtpError::Expired);
            }
            if !self
                .hasher
                .verify_blocking(code.to_string(), stored_hash.clone())
                .await?
            {
                return Err(OtpError::Mismatch);
            }
            Some(stored_hash)
        };

        let Some(identity) = self
            .store
            .consume_code(identity.id, expected_hash.as_deref(), now)
            .await?
        else {
            return Err(self.lost_consume(identity.id).await);
        };

        if identity.display_name.is_none() {
            if let Err(err) = self.notifier.send_welcome(&identity.email, None).await {
                warn!("welcome email failed: {err:#}");
            }
        }

        let token = self.sessions.mint(&identity, now)?;
        info!(identity_id = %identity.id, "one-time code verified");
        Ok(VerifiedLogin { token, identity })
    }

    // The checked code was replaced by a resend or consumed by a parallel
    // verify before this request could clear it.
    async fn lost_consume(&self, id: Uuid) -> OtpError {
        match self.store.find_by_id(id).await {
            Ok(Some(current)) if current.has_pending_code() => OtpError::Mismatch,
            Ok(Some(_)) => OtpError::NoPendingCode,
            Ok(None) => OtpError::NotFound,
            Err(err) => OtpError::Internal(err),
        }
    }

    /// # Errors
    /// `NotFound` when the record no longer exists.
    pub async fn identity(&self, id: Uuid) -> Result<Identity, OtpError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(OtpError::NotFound)
    }

    /// # Errors
    /// `InvalidDisplayName` for a blank name, `NotFound`, or `Internal`.
    #[instrument(skip(self, display_name))]
    pub async fn update_display_name(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Identity, OtpError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(OtpError::InvalidDisplayName);
        }
        self.store
            .set_display_name(id, display_name, self.clock.now())
            .await?
            .ok_or(OtpError::NotFound)
    }
}

fn checked_email(email: &str) -> Result<String, OtpError> {
    let email = normalize_email(email);
    if valid_email(&email) {
        Ok(email)
    } else {
        Err(OtpError::InvalidEmail)
    }
}
