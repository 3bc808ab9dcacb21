//! Event ingestion service.
//!
//! Pipeline per accepted request: hash the raw body, encrypt it, store the
//! ciphertext in the blob store, then insert the event row and its pending
//! delivery row in a single transaction. The transactional pair is what
//! makes "no accepted event is ever lost" hold: an acknowledged event always
//! has a delivery the worker will pick up, or the caller got a 5xx and is
//! expected to retry.
//!
//! A blob whose transaction fails afterwards is orphaned; that is accepted
//! and cleaned up out of band.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::blob::{self, BlobStore};
use crate::crypto::PayloadCipher;
use crate::error::ApiError;
use crate::models::IngestResponse;
use event_inbox_db::models::{CreateDelivery, CreateWebhookEvent, Delivery, WebhookEvent};
use event_inbox_db::DbError;

/// Deadline for the blob PUT.
const BLOB_PUT_DEADLINE: Duration = Duration::from_secs(10);

/// Deadline for the event + delivery transaction.
const DB_DEADLINE: Duration = Duration::from_secs(5);

/// Content type recorded when the provider sent none, and the content type
/// of every at-rest blob.
const OCTET_STREAM: &str = "application/octet-stream";

/// Service for accepting and durably recording inbound webhooks.
#[derive(Clone)]
pub struct IngestService {
    pool: PgPool,
    cipher: Arc<PayloadCipher>,
    blob: Arc<BlobStore>,
    max_body_bytes: usize,
}

impl IngestService {
    /// Create a new ingest service.
    pub fn new(
        pool: PgPool,
        cipher: Arc<PayloadCipher>,
        blob: Arc<BlobStore>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            pool,
            cipher,
            blob,
            max_body_bytes,
        }
    }

    /// Accept one inbound webhook request.
    pub async fn ingest(
        &self,
        provider: &str,
        tenant_id: &str,
        endpoint_id: &str,
        headers: &HeaderMap,
        peer: SocketAddr,
        body: &[u8],
    ) -> Result<IngestResponse, ApiError> {
        // The route layer already caps the body; this re-check keeps the
        // contract local and covers callers that bypass the router.
        if body.len() > self.max_body_bytes {
            return Err(ApiError::PayloadTooLarge {
                limit: self.max_body_bytes,
            });
        }

        let body_sha = hex::encode(Sha256::digest(body));
        let ciphertext = self.cipher.encrypt(body)?;

        let event_id = Uuid::new_v4();
        let object_key = blob::object_key(tenant_id, provider, endpoint_id, event_id);

        match tokio::time::timeout(
            BLOB_PUT_DEADLINE,
            self.blob.put(&object_key, ciphertext, OCTET_STREAM),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ApiError::Storage(format!(
                    "put object {object_key}: deadline exceeded"
                )));
            }
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(OCTET_STREAM)
            .to_string();

        let event = CreateWebhookEvent {
            id: event_id,
            provider: provider.to_string(),
            tenant_id: tenant_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
            request_ip: client_ip(headers, peer),
            headers_json: headers_to_json(headers),
            content_type,
            body_size_bytes: body.len() as i64,
            payload_object_key: object_key,
            payload_sha256: body_sha,
        };

        let delivery = CreateDelivery {
            id: Uuid::new_v4(),
            event_id,
            tenant_id: tenant_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
        };

        match tokio::time::timeout(DB_DEADLINE, self.record(event, delivery)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ApiError::Internal(
                    "ingest transaction deadline exceeded".into(),
                ));
            }
        }

        tracing::info!(
            target: "ingress",
            event_id = %event_id,
            provider,
            tenant_id,
            endpoint_id,
            body_size = body.len(),
            "Stored inbound event"
        );

        Ok(IngestResponse {
            event_id,
            status: "stored".to_string(),
        })
    }

    /// Insert the event row and its delivery row atomically.
    ///
    /// The delivery is created even when no endpoint registration exists
    /// yet; the worker simply leaves it queued until one appears enabled.
    async fn record(
        &self,
        event: CreateWebhookEvent,
        delivery: CreateDelivery,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::QueryFailed)?;
        WebhookEvent::insert(&mut *tx, event).await?;
        Delivery::insert_pending(&mut *tx, delivery).await?;
        tx.commit().await.map_err(DbError::QueryFailed)?;
        Ok(())
    }
}

/// Client IP for the event record: first `X-Forwarded-For` token when
/// present, otherwise the peer address with the port stripped.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(xff) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = xff.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.ip().to_string()
}

/// Serialize request headers as a JSON map of name to list of values.
fn headers_to_json(headers: &HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for key in headers.keys() {
        let values: Vec<serde_json::Value> = headers
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| serde_json::Value::String(v.to_string()))
            .collect();
        map.insert(key.as_str().to_string(), serde_json::Value::Array(values));
    }
    serde_json::Value::Object(map)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "203.0.113.7:54321".parse().unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, peer()), "198.51.100.4");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer_without_port() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_ignores_empty_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_ip(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_headers_to_json_collects_multi_values() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));

        let json = headers_to_json(&headers);
        assert_eq!(json["content-type"][0], "text/plain");
        assert_eq!(json["x-tag"][0], "a");
        assert_eq!(json["x-tag"][1], "b");
    }
}
