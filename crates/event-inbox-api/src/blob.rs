//! Blob store adapter.
//!
//! A thin passthrough over an S3-compatible object store (MinIO in
//! development, S3 proper in production). No retries here; callers impose
//! their own deadlines with `tokio::time::timeout`.

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use uuid::Uuid;

use crate::error::ApiError;

/// Connection settings for the object store.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

/// S3-compatible blob store client.
#[derive(Clone)]
pub struct BlobStore {
    client: Client,
    bucket: String,
}

impl BlobStore {
    /// Build a client for the configured bucket.
    ///
    /// Path-style addressing keeps MinIO and other S3-compatible stores
    /// working without virtual-host DNS.
    pub fn new(cfg: BlobConfig) -> Result<Self, ApiError> {
        if cfg.endpoint.is_empty() {
            return Err(ApiError::Storage("S3_ENDPOINT empty".into()));
        }
        if cfg.bucket.is_empty() {
            return Err(ApiError::Storage("S3_BUCKET empty".into()));
        }

        let credentials =
            Credentials::new(cfg.access_key, cfg.secret_key, None, None, "event-inbox");

        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(cfg.region))
            .endpoint_url(cfg.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            bucket: cfg.bucket,
        })
    }

    /// Store an opaque blob at `key`.
    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ApiError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("put object {key}: {e}")))?;
        Ok(())
    }

    /// Fetch the blob at `key`.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, ApiError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("get object {key}: {e}")))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| ApiError::Storage(format!("read object {key}: {e}")))?;

        Ok(bytes.into_bytes().to_vec())
    }
}

/// Deterministic object key for an event payload.
pub fn object_key(tenant_id: &str, provider: &str, endpoint_id: &str, event_id: Uuid) -> String {
    format!("{tenant_id}/{provider}/{endpoint_id}/{event_id}.bin")
}
