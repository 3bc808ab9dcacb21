//! Delivery execution service.
//!
//! `process_one` is the worker's atomic unit: claim one due delivery inside
//! a short transaction, then fetch + decrypt the payload and perform the
//! outbound POST outside it, then record the outcome. Holding no row lock
//! during the HTTP call is what lets slow receivers coexist with the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::Client;
use sqlx::PgPool;

use crate::blob::BlobStore;
use crate::crypto::{self, PayloadCipher};
use crate::error::ApiError;
use event_inbox_db::models::{ClaimedJob, Delivery, Endpoint};
use event_inbox_db::DbError;

/// Deadline for the blob GET.
const BLOB_GET_DEADLINE: Duration = Duration::from_secs(10);

/// Total timeout for the outbound HTTP request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Service for executing webhook deliveries.
#[derive(Clone)]
pub struct DeliveryService {
    pool: PgPool,
    blob: Arc<BlobStore>,
    cipher: Arc<PayloadCipher>,
    http_client: Client,
}

impl DeliveryService {
    /// Create a new delivery service with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Internal` if the HTTP client cannot be built.
    pub fn new(
        pool: PgPool,
        blob: Arc<BlobStore>,
        cipher: Arc<PayloadCipher>,
    ) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("event-inbox/1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            pool,
            blob,
            cipher,
            http_client,
        })
    }

    /// Claim and process at most one due delivery.
    ///
    /// Returns `Ok(true)` if a job was claimed. Database errors bubble up;
    /// the worker logs them and the next poll retries. Everything else is
    /// recorded on the delivery row and does not surface here.
    pub async fn process_one(&self) -> Result<bool, ApiError> {
        let mut tx = self.pool.begin().await.map_err(DbError::QueryFailed)?;

        let Some(job) = Delivery::claim_next(&mut *tx).await? else {
            tx.commit().await.map_err(DbError::QueryFailed)?;
            return Ok(false);
        };

        Delivery::mark_delivering(&mut *tx, job.delivery_id).await?;
        // Committing releases the row lock; from here the claim is ours by
        // virtue of the status flip and this call frame.
        tx.commit().await.map_err(DbError::QueryFailed)?;

        self.execute(&job).await?;
        Ok(true)
    }

    /// One delivery attempt: blob GET, decrypt, POST, record outcome.
    async fn execute(&self, job: &ClaimedJob) -> Result<(), ApiError> {
        let blob = match tokio::time::timeout(
            BLOB_GET_DEADLINE,
            self.blob.get(&job.payload_object_key),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                return self
                    .fail_and_schedule(job, None, &format!("blob get failed: {e}"))
                    .await;
            }
            Err(_) => {
                return self
                    .fail_and_schedule(job, None, "blob get failed: deadline exceeded")
                    .await;
            }
        };

        let plaintext = match self.cipher.decrypt(&blob) {
            Ok(p) => p,
            Err(e) => {
                return self
                    .fail_and_schedule(job, None, &format!("decrypt failed: {e}"))
                    .await;
            }
        };

        let timestamp = Utc::now().timestamp();
        let request = build_outbound_request(&self.http_client, job, plaintext, timestamp);

        match request.send().await {
            Ok(response) => {
                let status_code = i32::from(response.status().as_u16());
                if (200..300).contains(&status_code) {
                    Delivery::mark_delivered(&self.pool, job.delivery_id, status_code).await?;
                    tracing::info!(
                        target: "delivery",
                        delivery_id = %job.delivery_id,
                        event_id = %job.event_id,
                        tenant_id = %job.tenant_id,
                        endpoint_id = %job.endpoint_id,
                        status_code,
                        attempt = job.attempt_count + 1,
                        "Delivery succeeded"
                    );
                    Ok(())
                } else {
                    self.fail_and_schedule(
                        job,
                        Some(status_code),
                        &format!("non-2xx: {status_code}"),
                    )
                    .await
                }
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    "request timeout (10s)".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    format!("request failed: {e}")
                };
                self.fail_and_schedule(job, None, &error_msg).await
            }
        }
    }

    /// Record a failed attempt: reschedule with exponential backoff, or mark
    /// the delivery terminally failed once the policy is exhausted.
    async fn fail_and_schedule(
        &self,
        job: &ClaimedJob,
        status_code: Option<i32>,
        error: &str,
    ) -> Result<(), ApiError> {
        let attempt = job.attempt_count + 1;
        let max_attempts = if job.max_attempts > 0 {
            job.max_attempts
        } else {
            Endpoint::DEFAULT_MAX_ATTEMPTS
        };
        let status_code = status_code.filter(|code| *code != 0);

        if attempt >= max_attempts {
            Delivery::mark_failed(&self.pool, job.delivery_id, attempt, status_code, error)
                .await?;
            tracing::warn!(
                target: "delivery",
                delivery_id = %job.delivery_id,
                event_id = %job.event_id,
                attempt,
                error,
                "Delivery exhausted all attempts"
            );
            return Ok(());
        }

        let backoff = backoff_seconds(
            attempt,
            job.initial_backoff_seconds,
            job.max_backoff_seconds,
        );
        let next_attempt_at = Utc::now() + chrono::Duration::seconds(backoff);

        Delivery::reschedule(
            &self.pool,
            job.delivery_id,
            attempt,
            next_attempt_at,
            status_code,
            error,
        )
        .await?;

        tracing::warn!(
            target: "delivery",
            delivery_id = %job.delivery_id,
            event_id = %job.event_id,
            attempt,
            backoff_seconds = backoff,
            error,
            "Delivery attempt failed, rescheduled"
        );
        Ok(())
    }
}

/// Build the outbound POST for one attempt.
///
/// Header values here are constants, UUIDs, and caller-supplied identifier
/// strings; a value that fails to parse is silently dropped rather than
/// aborting the attempt.
pub fn build_outbound_request(
    client: &Client,
    job: &ClaimedJob,
    plaintext: Vec<u8>,
    timestamp: i64,
) -> reqwest::RequestBuilder {
    let mut headers = HeaderMap::new();

    let content_type = if job.content_type.is_empty() {
        "application/octet-stream"
    } else {
        job.content_type.as_str()
    };
    if let Ok(v) = content_type.parse() {
        headers.insert(reqwest::header::CONTENT_TYPE, v);
    }

    if let Ok(v) = job.event_id.to_string().parse() {
        headers.insert("X-Event-Inbox-Event-ID", v);
    }
    if let Ok(v) = job.delivery_id.to_string().parse() {
        headers.insert("X-Event-Inbox-Delivery-ID", v);
    }
    if let Ok(v) = job.tenant_id.parse() {
        headers.insert("X-Event-Inbox-Tenant-ID", v);
    }
    if let Ok(v) = job.endpoint_id.parse() {
        headers.insert("X-Event-Inbox-Endpoint-ID", v);
    }

    if !job.signing_secret.is_empty() {
        let ts = timestamp.to_string();
        let signature = crypto::compute_signature(&job.signing_secret, &ts, &plaintext);
        if let Ok(v) = ts.parse() {
            headers.insert("X-Event-Inbox-Timestamp", v);
        }
        if let Ok(v) = format!("v1={signature}").parse() {
            headers.insert("X-Event-Inbox-Signature", v);
        }
    }

    client.post(&job.delivery_url).headers(headers).body(plaintext)
}

/// `backoff = min(initial * 2^min(attempt - 1, 10), max_backoff)`.
///
/// The exponent cap keeps the shift from overflowing; non-positive policy
/// values fall back to the endpoint defaults.
pub fn backoff_seconds(attempt: i32, initial_backoff: i32, max_backoff: i32) -> i64 {
    let initial = i64::from(if initial_backoff > 0 {
        initial_backoff
    } else {
        Endpoint::DEFAULT_INITIAL_BACKOFF_SECONDS
    });
    let cap = i64::from(if max_backoff > 0 {
        max_backoff
    } else {
        Endpoint::DEFAULT_MAX_BACKOFF_SECONDS
    });

    let exponent = (attempt - 1).clamp(0, 10) as u32;
    (initial << exponent).min(cap)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job(secret: &str, content_type: &str) -> ClaimedJob {
        ClaimedJob {
            delivery_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            tenant_id: "tA".into(),
            endpoint_id: "eA".into(),
            delivery_url: "http://127.0.0.1:1/hook".into(),
            signing_secret: secret.into(),
            payload_object_key: "tA/stripe/eA/x.bin".into(),
            content_type: content_type.into(),
            attempt_count: 0,
            max_attempts: 12,
            initial_backoff_seconds: 5,
            max_backoff_seconds: 600,
        }
    }

    // --- backoff schedule ---

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_seconds(1, 2, 30), 2);
        assert_eq!(backoff_seconds(2, 2, 30), 4);
        assert_eq!(backoff_seconds(3, 2, 30), 8);
        assert_eq!(backoff_seconds(4, 2, 30), 16);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        assert_eq!(backoff_seconds(5, 2, 30), 30);
        assert_eq!(backoff_seconds(9, 2, 30), 30);
    }

    #[test]
    fn test_backoff_default_schedule() {
        // 5 * 2^(n-1) capped at 600
        assert_eq!(backoff_seconds(1, 5, 600), 5);
        assert_eq!(backoff_seconds(4, 5, 600), 40);
        assert_eq!(backoff_seconds(8, 5, 600), 600);
    }

    #[test]
    fn test_backoff_exponent_capped_at_ten() {
        // attempt 50 would shift by 49 without the cap
        assert_eq!(backoff_seconds(50, 1, i32::MAX), 1024);
    }

    #[test]
    fn test_backoff_reapplies_defaults_for_non_positive_policy() {
        assert_eq!(backoff_seconds(1, 0, 0), 5);
        assert_eq!(backoff_seconds(12, -1, -1), 600);
    }

    // --- outbound request construction ---

    #[test]
    fn test_outbound_request_identifier_headers() {
        let client = Client::builder().build().unwrap();
        let j = job("", "application/json");
        let request = build_outbound_request(&client, &j, b"hello".to_vec(), 1_754_000_000)
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(
            headers["x-event-inbox-event-id"],
            j.event_id.to_string().as_str()
        );
        assert_eq!(
            headers["x-event-inbox-delivery-id"],
            j.delivery_id.to_string().as_str()
        );
        assert_eq!(headers["x-event-inbox-tenant-id"], "tA");
        assert_eq!(headers["x-event-inbox-endpoint-id"], "eA");
        assert!(headers.get("x-event-inbox-signature").is_none());
        assert!(headers.get("x-event-inbox-timestamp").is_none());

        assert_eq!(request.body().unwrap().as_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_outbound_request_defaults_content_type() {
        let client = Client::builder().build().unwrap();
        let request = build_outbound_request(&client, &job("", ""), Vec::new(), 0)
            .build()
            .unwrap();
        assert_eq!(
            request.headers()["content-type"],
            "application/octet-stream"
        );
    }

    #[test]
    fn test_outbound_request_signature_headers() {
        let client = Client::builder().build().unwrap();
        let request = build_outbound_request(
            &client,
            &job("whsec_s", "application/json"),
            b"{}".to_vec(),
            1_754_000_000,
        )
        .build()
        .unwrap();

        let headers = request.headers();
        assert_eq!(headers["x-event-inbox-timestamp"], "1754000000");

        let signature = headers["x-event-inbox-signature"].to_str().unwrap();
        let expected = crypto::compute_signature("whsec_s", "1754000000", b"{}");
        assert_eq!(signature, format!("v1={expected}"));
    }
}
