//! Error to HTTP response mapping for auth routes. Bodies are always `{"message": ...}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use super::types::MessageResponse;
use crate::otp::{ErrorCategory, OtpError, rate_limit::RateLimitDecision};
use crate::session::SessionError;

pub(super) fn message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

fn missing_payload() -> Response {
    message(StatusCode::BAD_REQUEST, "Missing payload")
}

/// Body that never reached the handler. Only an absent or non-JSON body
/// counts as missing.
pub(super) fn rejected(rejection: &JsonRejection) -> Response {
    debug!("rejected request body: {rejection}");
    match rejection {
        JsonRejection::JsonSyntaxError(_) => {
            message(StatusCode::BAD_REQUEST, "Malformed JSON payload")
        }
        JsonRejection::JsonDataError(_) => message(StatusCode::BAD_REQUEST, "Invalid payload"),
        _ => missing_payload(),
    }
}

pub(super) fn otp_error(err: &OtpError, context: &str) -> Response {
    let status = match err.category() {
        ErrorCategory::Validation | ErrorCategory::Authentication => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Internal => {
            error!("{context} failed: {err:#}");
            return message(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {context}. Please try again."),
            );
        }
    };
    message(status, err.to_string())
}

/// 429 with the wait rounded up to whole minutes and a `Retry-After` header in seconds.
pub(super) fn rate_limited(decision: RateLimitDecision) -> Response {
    let minutes = decision.wait_minutes().unwrap_or(1);
    let mut response = message(
        StatusCode::TOO_MANY_REQUESTS,
        format!("Too many OTP requests. Please try again in {minutes} minutes."),
    );
    if let Some(seconds) = decision.wait_seconds() {
        if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
    }
    response
}

pub(super) fn unauthorized(err: Option<&SessionError>) -> Response {
    match err {
        None => message(StatusCode::UNAUTHORIZED, "No token, authorization denied"),
        Some(SessionError::Expired) => message(StatusCode::UNAUTHORIZED, "Token has expired"),
        Some(_) => message(StatusCode::UNAUTHORIZED, "Token is not valid"),
    }
}
