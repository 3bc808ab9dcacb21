//! Delivery queue model.
//!
//! One row per (event, endpoint) pair, advancing through
//! `pending -> delivering -> delivered | failed`. Workers claim due rows
//! with `FOR UPDATE SKIP LOCKED` inside a short transaction; the HTTP call
//! happens outside it so delivery latency never holds a row lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::DbError;

/// Database entity for a delivery attempt chain.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub event_id: Uuid,
    pub tenant_id: String,
    pub endpoint_id: String,
    pub status: String,
    pub attempt_count: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_status_code: Option<i32>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for enqueueing a new delivery.
#[derive(Debug, Clone)]
pub struct CreateDelivery {
    pub id: Uuid,
    pub event_id: Uuid,
    pub tenant_id: String,
    pub endpoint_id: String,
}

/// A claimed due delivery joined with the endpoint policy and event
/// metadata the worker needs for one attempt.
#[derive(Debug, Clone, FromRow)]
pub struct ClaimedJob {
    pub delivery_id: Uuid,
    pub event_id: Uuid,
    pub tenant_id: String,
    pub endpoint_id: String,
    pub delivery_url: String,
    pub signing_secret: String,
    pub payload_object_key: String,
    pub content_type: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub initial_backoff_seconds: i32,
    pub max_backoff_seconds: i32,
}

impl Delivery {
    /// Enqueue a delivery: `pending`, zero attempts, due immediately.
    pub async fn insert_pending(
        executor: impl PgExecutor<'_>,
        input: CreateDelivery,
    ) -> Result<Self, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO deliveries (
                id, event_id, tenant_id, endpoint_id,
                status, attempt_count, next_attempt_at
            )
            VALUES ($1, $2, $3, $4, 'pending', 0, now())
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(input.event_id)
        .bind(&input.tenant_id)
        .bind(&input.endpoint_id)
        .fetch_one(executor)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Find a delivery by id.
    pub async fn find(executor: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Self>, DbError> {
        sqlx::query_as("SELECT * FROM deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(DbError::QueryFailed)
    }

    /// Lock the oldest due delivery whose endpoint is enabled.
    ///
    /// Must run inside a transaction; the row lock is what keeps concurrent
    /// worker replicas off the same job. A `delivering` row is claimable
    /// again on purpose: a worker that crashed after its claim commit leaves
    /// the row due, and the next poll picks it back up.
    pub async fn claim_next(executor: impl PgExecutor<'_>) -> Result<Option<ClaimedJob>, DbError> {
        sqlx::query_as(
            r#"
            SELECT
                d.id AS delivery_id,
                d.event_id,
                d.tenant_id,
                d.endpoint_id,
                e.delivery_url,
                e.signing_secret,
                we.payload_object_key,
                we.content_type,
                d.attempt_count,
                e.max_attempts,
                e.initial_backoff_seconds,
                e.max_backoff_seconds
            FROM deliveries d
            JOIN endpoints e
                ON e.tenant_id = d.tenant_id AND e.endpoint_id = d.endpoint_id
            JOIN webhook_events we ON we.id = d.event_id
            WHERE d.status IN ('pending', 'delivering')
              AND d.next_attempt_at <= now()
              AND e.enabled = TRUE
            ORDER BY d.next_attempt_at ASC
            FOR UPDATE OF d SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(executor)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Flip a claimed row to `delivering`.
    ///
    /// Deliberately leaves `next_attempt_at` untouched so the row stays
    /// visible to the claim query if this worker dies before recording an
    /// outcome.
    pub async fn mark_delivering(executor: impl PgExecutor<'_>, id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'delivering', updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(executor)
        .await
        .map_err(DbError::QueryFailed)?;
        Ok(())
    }

    /// Record a successful attempt; terminal.
    pub async fn mark_delivered(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        status_code: i32,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'delivered',
                last_status_code = $2,
                last_error = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status_code)
        .execute(executor)
        .await
        .map_err(DbError::QueryFailed)?;
        Ok(())
    }

    /// Record a failed attempt and put the row back in the queue.
    pub async fn reschedule(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        attempt_count: i32,
        next_attempt_at: DateTime<Utc>,
        status_code: Option<i32>,
        error: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'pending',
                attempt_count = $2,
                next_attempt_at = $3,
                last_status_code = $4,
                last_error = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempt_count)
        .bind(next_attempt_at)
        .bind(status_code)
        .bind(error)
        .execute(executor)
        .await
        .map_err(DbError::QueryFailed)?;
        Ok(())
    }

    /// Record a failed attempt that exhausted the policy; terminal.
    pub async fn mark_failed(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        attempt_count: i32,
        status_code: Option<i32>,
        error: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'failed',
                attempt_count = $2,
                last_status_code = $3,
                last_error = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempt_count)
        .bind(status_code)
        .bind(error)
        .execute(executor)
        .await
        .map_err(DbError::QueryFailed)?;
        Ok(())
    }
}
