use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionHeader {
    pub alg: String,
    pub typ: String,
}

impl SessionHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, SessionError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, SessionError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| SessionError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(secret: &[u8], signing_input: &str) -> Result<HmacSha256, SessionError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SessionError::Key)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Create an HS256 signed JWT.
///
/// # Errors
///
/// Returns an error if the claims cannot be encoded or the key is rejected.
pub fn sign_hs256<C: Serialize>(secret: &[u8], claims: &C) -> Result<String, SessionError> {
    let header_b64 = b64e_json(&SessionHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature = mac(secret, &signing_input)?.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Check the structure and signature of an HS256 JWT and decode its claims.
/// Claim validation (issuer, expiry) is left to the caller.
///
/// # Errors
///
/// Returns an error if the token is malformed, uses another algorithm,
/// or the signature does not match.
pub fn verify_hs256<C: for<'de> Deserialize<'de>>(
    secret: &[u8],
    token: &str,
) -> Result<C, SessionError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(SessionError::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(SessionError::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(SessionError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(SessionError::TokenFormat);
    }

    let header: SessionHeader = b64d_json(header_b64)?;
    if header.alg != ALG {
        return Err(SessionError::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| SessionError::Base64)?;
    // Constant-time comparison.
    mac(secret, &signing_input)?
        .verify_slice(&signature)
        .map_err(|_| SessionError::InvalidSignature)?;

    b64d_json(claims_b64)
}
