//! Webhook event model.
//!
//! One immutable row per accepted inbound request. The payload itself never
//! touches this table; it lives encrypted in the blob store at
//! `payload_object_key`, and `payload_sha256` pins the decrypted bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DbError;

/// Database entity for an accepted inbound webhook request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub provider: String,
    pub tenant_id: String,
    pub endpoint_id: String,
    pub request_ip: String,
    /// Request headers as a JSON map of name to list of values.
    pub headers_json: serde_json::Value,
    pub content_type: String,
    pub body_size_bytes: i64,
    pub payload_object_key: String,
    pub payload_sha256: String,
    pub received_at: DateTime<Utc>,
}

/// Input for recording a new webhook event.
#[derive(Debug, Clone)]
pub struct CreateWebhookEvent {
    pub id: Uuid,
    pub provider: String,
    pub tenant_id: String,
    pub endpoint_id: String,
    pub request_ip: String,
    pub headers_json: serde_json::Value,
    pub content_type: String,
    pub body_size_bytes: i64,
    pub payload_object_key: String,
    pub payload_sha256: String,
}

impl WebhookEvent {
    /// Insert a new event row.
    ///
    /// Takes any executor so ingest can run this in the same transaction as
    /// the delivery insert.
    pub async fn insert(
        executor: impl sqlx::PgExecutor<'_>,
        input: CreateWebhookEvent,
    ) -> Result<Self, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_events (
                id, provider, tenant_id, endpoint_id, request_ip,
                headers_json, content_type, body_size_bytes,
                payload_object_key, payload_sha256
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(&input.provider)
        .bind(&input.tenant_id)
        .bind(&input.endpoint_id)
        .bind(&input.request_ip)
        .bind(&input.headers_json)
        .bind(&input.content_type)
        .bind(input.body_size_bytes)
        .bind(&input.payload_object_key)
        .bind(&input.payload_sha256)
        .fetch_one(executor)
        .await
        .map_err(DbError::QueryFailed)
    }
}
