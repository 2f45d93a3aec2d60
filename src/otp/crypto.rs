//! One-time code generation and Argon2id hashing.
//!
//! Codes are never stored in plaintext. Hashing is CPU-bound, so async callers
//! go through [`CodeHasher::hash_blocking`] / [`CodeHasher::verify_blocking`],
//! which move the work onto Tokio's blocking pool.

use anyhow::{Context, Result, anyhow};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use argon2::password_hash::SaltString;
use rand::{Rng, rngs::OsRng};

pub const CODE_LEN: usize = 6;
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Generate a 6-digit numeric code in `100000..=999999`.
#[must_use]
pub fn generate_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Exactly six ASCII digits.
#[must_use]
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Clone, Debug)]
pub struct CodeHasher {
    params: Params,
}

impl Default for CodeHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CodeHasher {
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a code into a PHC string.
    ///
    /// # Errors
    /// Returns an error if Argon2 rejects the input.
    pub fn hash(&self, code: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(code.as_bytes(), &salt)
            .map_err(|err| anyhow!("failed to hash one-time code: {err}"))?
            .to_string();
        Ok(hash)
    }

    /// Check a code against a stored PHC string.
    ///
    /// # Errors
    /// Returns an error if the stored hash cannot be parsed.
    pub fn verify(&self, code: &str, stored_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|err| anyhow!("invalid stored code hash: {err}"))?;
        Ok(self
            .argon2()
            .verify_password(code.as_bytes(), &parsed)
            .is_ok())
    }

    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hash_blocking(&self, code: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&code))
            .await
            .context("code hashing task failed")?
    }

    /// # Errors
    /// Returns an error if the stored hash is unreadable or the blocking task panics.
    pub async fn verify_blocking(&self, code: String, stored_hash: String) -> Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&code, &stored_hash))
            .await
            .context("code verification task failed")?
    }
}
