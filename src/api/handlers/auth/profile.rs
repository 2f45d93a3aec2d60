//! Bearer-authenticated profile endpoints.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::error::{message, otp_error, rejected, unauthorized};
use super::state::AuthState;
use super::types::{MessageResponse, ProfileResponse, ProfileUpdatedResponse, UpdateProfileRequest};
use super::utils::extract_bearer_token;
use crate::otp::OtpError;
use crate::session::SessionClaims;

fn authenticate(headers: &HeaderMap, auth_state: &AuthState) -> Result<SessionClaims, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(unauthorized(None));
    };
    let now = auth_state.otp().clock().now();
    auth_state
        .otp()
        .sessions()
        .verify(&token, now)
        .map_err(|err| {
            debug!("rejected session token: {err}");
            unauthorized(Some(&err))
        })
}

fn gone_or(err: &OtpError, context: &str) -> Response {
    match err {
        OtpError::NotFound => message(StatusCode::NOT_FOUND, "User not found"),
        _ => otp_error(err, context),
    }
}

/// Current identity for the bearer token.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    params(
        ("Authorization" = String, Header, description = "Bearer session token")
    ),
    responses(
        (status = 200, description = "Current identity", body = ProfileResponse),
        (status = 401, description = "Missing, invalid or expired token", body = MessageResponse),
        (status = 404, description = "Identity no longer exists", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let claims = match authenticate(&headers, &auth_state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    match auth_state.otp().identity(claims.sub).await {
        Ok(identity) => (StatusCode::OK, Json(ProfileResponse::from(&identity))).into_response(),
        Err(err) => gone_or(&err, "load profile"),
    }
}

/// Set the display name.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = UpdateProfileRequest,
    params(
        ("Authorization" = String, Header, description = "Bearer session token")
    ),
    responses(
        (status = 200, description = "Profile updated", body = ProfileUpdatedResponse),
        (status = 400, description = "Missing username", body = MessageResponse),
        (status = 401, description = "Missing, invalid or expired token", body = MessageResponse),
        (status = 404, description = "Identity no longer exists", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn update_profile(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> impl IntoResponse {
    let claims = match authenticate(&headers, &auth_state) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let request: UpdateProfileRequest = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejected(&rejection),
    };

    let username = request.username.unwrap_or_default();
    match auth_state
        .otp()
        .update_display_name(claims.sub, &username)
        .await
    {
        Ok(identity) => (
            StatusCode::OK,
            Json(ProfileUpdatedResponse {
                success: true,
                user: identity.summary(),
            }),
        )
            .into_response(),
        Err(err) => gone_or(&err, "update profile"),
    }
}
