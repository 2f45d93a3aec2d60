//! One-time code endpoints.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::error::{message, otp_error, rate_limited, rejected};
use super::state::AuthState;
use super::types::{
    LoginResponse, MessageResponse, OtpSentResponse, ResendOtpRequest, SendOtpRequest,
    VerifyOtpRequest,
};
use super::utils::required;
use crate::otp::{OtpError, models::OtpPurpose, normalize_email, valid_email};

/// Normalize and gate an email: format check first, then the per-email window.
fn admit_email(auth_state: &AuthState, raw: Option<&str>) -> Result<String, Response> {
    let Some(raw) = required(raw) else {
        return Err(message(StatusCode::BAD_REQUEST, "Email is required"));
    };
    let email = normalize_email(raw);
    if !valid_email(&email) {
        return Err(message(StatusCode::BAD_REQUEST, "Invalid email format"));
    }
    let decision = auth_state.rate_limiter().check_and_record(&email);
    if !decision.is_allowed() {
        return Err(rate_limited(decision));
    }
    Ok(email)
}

/// Request a one-time code for login or registration.
#[utoipa::path(
    post,
    path = "/api/auth/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code issued", body = OtpSentResponse),
        (status = 400, description = "Missing/invalid email or purpose, or already registered", body = MessageResponse),
        (status = 429, description = "Too many requests for this email", body = MessageResponse),
        (status = 500, description = "Internal error", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn send_otp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request: SendOtpRequest = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejected(&rejection),
    };

    let purpose = match request.purpose.as_deref().map(str::parse::<OtpPurpose>) {
        None => OtpPurpose::default(),
        Some(Ok(purpose)) => purpose,
        Some(Err(err)) => {
            debug!("{err}");
            return message(StatusCode::BAD_REQUEST, "Invalid purpose");
        }
    };

    let email = match admit_email(&auth_state, request.email.as_deref()) {
        Ok(email) => email,
        Err(response) => return response,
    };

    match auth_state.otp().issue(&email, purpose).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(OtpSentResponse {
                success: true,
                message: format!("OTP sent to {}. Please check your inbox.", outcome.email),
                expires_in: outcome.expires_in,
            }),
        )
            .into_response(),
        Err(err) => otp_error(&err, "send OTP"),
    }
}

/// Submit a one-time code and receive a session token.
#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verified; session issued", body = LoginResponse),
        (status = 400, description = "Malformed, missing, expired or wrong code", body = MessageResponse),
        (status = 404, description = "Unknown email", body = MessageResponse),
        (status = 500, description = "Internal error", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejected(&rejection),
    };

    let (Some(email), Some(code)) = (
        required(request.email.as_deref()),
        required(request.otp.as_deref()),
    ) else {
        return message(StatusCode::BAD_REQUEST, "Email and OTP are required");
    };

    match auth_state.otp().verify(email, code).await {
        Ok(login) => (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                user: login.summary(),
                token: login.token,
            }),
        )
            .into_response(),
        Err(err) => otp_error(&err, "verify OTP"),
    }
}

/// Re-send a code to an email that already requested one.
#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Code re-issued", body = OtpSentResponse),
        (status = 400, description = "Missing/invalid email", body = MessageResponse),
        (status = 404, description = "Unknown email", body = MessageResponse),
        (status = 429, description = "Too many requests for this email", body = MessageResponse),
        (status = 500, description = "Internal error", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn resend_otp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<ResendOtpRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request: ResendOtpRequest = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejected(&rejection),
    };

    let email = match admit_email(&auth_state, request.email.as_deref()) {
        Ok(email) => email,
        Err(response) => return response,
    };

    match auth_state.otp().resend(&email).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(OtpSentResponse {
                success: true,
                message: format!("New OTP sent to {}", outcome.email),
                expires_in: outcome.expires_in,
            }),
        )
            .into_response(),
        Err(OtpError::NotFound) => message(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => otp_error(&err, "resend OTP"),
    }
}
