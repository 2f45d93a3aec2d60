//! Identity persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::Instrument;
use uuid::Uuid;

use super::models::Identity;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>>;

    /// Insert a new record, or store `identity`'s pending code on the record
    /// that already owns the email. Only `otp_hash`, `otp_expires_at` and
    /// `updated_at` are written on conflict; the returned record keeps its
    /// original `id`, `created_at` and every other column.
    async fn save(&self, identity: &Identity) -> Result<Identity>;

    /// Clear the pending code, mark the record verified and stamp the login.
    ///
    /// With `expected_hash` set, this only happens while that hash is still the
    /// pending one. `None` means a code was replaced or consumed in between.
    async fn consume_code(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>>;

    /// Writes `display_name` only. `None` when the record does not exist.
    async fn set_display_name(
        &self,
        id: Uuid,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>>;

    /// Cheap liveness probe for `/health`.
    async fn ping(&self) -> Result<()>;

    fn kind(&self) -> &'static str;
}

pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.sql.table = "identities"
        );
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("Failed to fetch identity by email")
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.sql.table = "identities"
        );
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("Failed to fetch identity by id")
    }

    async fn save(&self, identity: &Identity) -> Result<Identity> {
        let query = r"
            INSERT INTO identities
            (id, email, display_name, password_hash, otp_hash, otp_expires_at,
             verified, role, last_authenticated_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (email) DO UPDATE SET
                otp_hash = EXCLUDED.otp_hash,
                otp_expires_at = EXCLUDED.otp_expires_at,
                updated_at = EXCLUDED.updated_at
            RETURNING *
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPSERT",
            db.sql.table = "identities"
        );
        sqlx::query_as::<_, Identity>(query)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(identity.display_name.as_deref())
            .bind(identity.password_hash.as_deref())
            .bind(identity.otp_hash.as_deref())
            .bind(identity.otp_expires_at)
            .bind(identity.verified)
            .bind(identity.role.as_str())
            .bind(identity.last_authenticated_at)
            .bind(identity.created_at)
            .bind(identity.updated_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("Failed to upsert identity")
    }

    async fn consume_code(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        let query = r"
            UPDATE identities SET
                otp_hash = NULL,
                otp_expires_at = NULL,
                verified = TRUE,
                last_authenticated_at = $3,
                updated_at = $3
            WHERE id = $1 AND ($2::text IS NULL OR otp_hash = $2)
            RETURNING *
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.sql.table = "identities"
        );
        sqlx::query_as::<_, Identity>(query)
            .bind(id)
            .bind(expected_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("Failed to consume one-time code")
    }

    async fn set_display_name(
        &self,
        id: Uuid,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.sql.table = "identities"
        );
        sqlx::query_as::<_, Identity>(
            "UPDATE identities SET display_name = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(display_name)
        .bind(now)
        .fetch_optional(&self.pool)
        .instrument(span)
        .await
        .context("Failed to update display name")
    }

    async fn ping(&self) -> Result<()> {
        let span = tracing::info_span!("db.ping", db.system = "postgresql");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryIdentityStore {
    by_email: RwLock<HashMap<String, Identity>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.by_email.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.by_email.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        Ok(self.by_email.read().await.get(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self
            .by_email
            .read()
            .await
            .values()
            .find(|identity| identity.id == id)
            .cloned())
    }

    async fn save(&self, identity: &Identity) -> Result<Identity> {
        let mut records = self.by_email.write().await;
        let stored = match records.get_mut(&identity.email) {
            Some(existing) => {
                existing.otp_hash.clone_from(&identity.otp_hash);
                existing.otp_expires_at = identity.otp_expires_at;
                existing.updated_at = identity.updated_at;
                existing.clone()
            }
            None => {
                records.insert(identity.email.clone(), identity.clone());
                identity.clone()
            }
        };
        Ok(stored)
    }

    async fn consume_code(
        &self,
        id: Uuid,
        expected_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        let mut records = self.by_email.write().await;
        let Some(identity) = records.values_mut().find(|identity| identity.id == id) else {
            return Ok(None);
        };
        if expected_hash.is_some_and(|expected| identity.otp_hash.as_deref() != Some(expected)) {
            return Ok(None);
        }
        identity.mark_authenticated(now);
        Ok(Some(identity.clone()))
    }

    async fn set_display_name(
        &self,
        id: Uuid,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>> {
        let mut records = self.by_email.write().await;
        Ok(records
            .values_mut()
            .find(|identity| identity.id == id)
            .map(|identity| {
                identity.display_name = Some(display_name.to_string());
                identity.updated_at = now;
                identity.clone()
            }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
