//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::otp::models::{Identity, IdentitySummary, OtpPurpose, Role};

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    /// `login` (default) or `register`.
    #[serde(default)]
    #[schema(value_type = Option<OtpPurpose>)]
    pub purpose: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ResendOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OtpSentResponse {
    pub success: bool,
    pub message: String,
    /// Seconds until the code expires.
    pub expires_in: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: IdentitySummary,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileUpdatedResponse {
    pub success: bool,
    pub user: IdentitySummary,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub is_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for ProfileResponse {
    fn from(identity: &Identity) -> Self {
        let summary = identity.summary();
        Self {
            id: summary.id,
            email: summary.email,
            username: summary.username,
            role: summary.role,
            is_verified: summary.is_verified,
            last_login: identity.last_authenticated_at,
            created_at: identity.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}
