use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Role {
    #[default]
    #[serde(rename = "user")]
    Standard,
    #[serde(rename = "admin")]
    Administrator,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "user",
            Self::Administrator => "admin",
        }
    }

    /// Parse the persisted `identities.role` textual value into a typed enum.
    fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "user" => Ok(Self::Standard),
            "admin" => Ok(Self::Administrator),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid identities.role value: {value}"),
            )))),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::Standard),
            "admin" => Ok(Self::Administrator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Why a code is being requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    #[default]
    Login,
    Register,
}

impl std::str::FromStr for OtpPurpose {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login" => Ok(Self::Login),
            "register" => Ok(Self::Register),
            other => Err(format!("unknown purpose: {other}")),
        }
    }
}

/// One identity per email address.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    /// Legacy password login; never written by the OTP flow.
    pub password_hash: Option<String>,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub role: Role,
    pub last_authenticated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Fresh, unverified record for `email` (already normalized).
    #[must_use]
    pub fn new(email: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            display_name: None,
            password_hash: None,
            otp_hash: None,
            otp_expires_at: None,
            verified: false,
            role: Role::Standard,
            last_authenticated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    /// Expired only when strictly past the stored expiry. No expiry means nothing to expire.
    #[must_use]
    pub fn otp_expired(&self, now: DateTime<Utc>) -> bool {
        self.otp_expires_at.is_some_and(|expires_at| expires_at < now)
    }

    #[must_use]
    pub fn has_pending_code(&self) -> bool {
        self.otp_hash.is_some()
    }

    /// Display name, or the local part of the email when unset.
    #[must_use]
    pub fn display_name_or_default(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }

    pub fn set_pending_code(&mut self, hash: String, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.otp_hash = Some(hash);
        self.otp_expires_at = Some(expires_at);
        self.updated_at = now;
    }

    pub fn clear_pending_code(&mut self) {
        self.otp_hash = None;
        self.otp_expires_at = None;
    }

    /// Successful verification: single-use code is consumed.
    pub fn mark_authenticated(&mut self, now: DateTime<Utc>) {
        self.verified = true;
        self.last_authenticated_at = Some(now);
        self.clear_pending_code();
        self.updated_at = now;
    }

    #[must_use]
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            id: self.id,
            email: self.email.clone(),
            username: self.display_name_or_default().to_string(),
            role: self.role,
            is_verified: self.verified,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Identity {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            password_hash: row.try_get("password_hash")?,
            otp_hash: row.try_get("otp_hash")?,
            otp_expires_at: row.try_get("otp_expires_at")?,
            verified: row.try_get("verified")?,
            role: Role::from_db(&role)?,
            last_authenticated_at: row.try_get("last_authenticated_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Redacted view returned to clients. Never carries code or password material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub is_verified: bool,
}
