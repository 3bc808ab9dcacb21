//! Endpoint registration model.
//!
//! A tenant-scoped delivery destination with its retry policy. Endpoints are
//! never deleted by the core; operators disable them with `enabled = false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Database entity for a registered delivery endpoint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub tenant_id: String,
    pub endpoint_id: String,
    pub delivery_url: String,
    pub enabled: bool,
    /// Shared HMAC key; empty means deliveries go out unsigned.
    pub signing_secret: String,
    pub max_attempts: i32,
    pub initial_backoff_seconds: i32,
    pub max_backoff_seconds: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for upserting an endpoint registration.
#[derive(Debug, Clone)]
pub struct UpsertEndpoint {
    pub tenant_id: String,
    pub endpoint_id: String,
    pub delivery_url: String,
    pub enabled: bool,
    pub signing_secret: String,
    pub max_attempts: i32,
    pub initial_backoff_seconds: i32,
    pub max_backoff_seconds: i32,
}

impl Endpoint {
    /// Retry policy fallbacks, applied when a stored value is non-positive.
    pub const DEFAULT_MAX_ATTEMPTS: i32 = 12;
    pub const DEFAULT_INITIAL_BACKOFF_SECONDS: i32 = 5;
    pub const DEFAULT_MAX_BACKOFF_SECONDS: i32 = 600;

    /// Idempotent upsert keyed on `(tenant_id, endpoint_id)`.
    ///
    /// An empty incoming `signing_secret` preserves the stored one, so
    /// repeating an upsert without the secret does not silently unsign the
    /// endpoint.
    pub async fn upsert(pool: &PgPool, input: UpsertEndpoint) -> Result<Self, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO endpoints (
                id, tenant_id, endpoint_id, delivery_url, enabled,
                signing_secret, max_attempts, initial_backoff_seconds, max_backoff_seconds
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id, endpoint_id)
            DO UPDATE SET
                delivery_url = EXCLUDED.delivery_url,
                enabled = EXCLUDED.enabled,
                signing_secret = CASE
                    WHEN EXCLUDED.signing_secret = '' THEN endpoints.signing_secret
                    ELSE EXCLUDED.signing_secret
                END,
                max_attempts = EXCLUDED.max_attempts,
                initial_backoff_seconds = EXCLUDED.initial_backoff_seconds,
                max_backoff_seconds = EXCLUDED.max_backoff_seconds,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.tenant_id)
        .bind(&input.endpoint_id)
        .bind(&input.delivery_url)
        .bind(input.enabled)
        .bind(&input.signing_secret)
        .bind(input.max_attempts)
        .bind(input.initial_backoff_seconds)
        .bind(input.max_backoff_seconds)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
