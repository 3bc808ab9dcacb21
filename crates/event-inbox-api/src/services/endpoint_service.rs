//! Endpoint registration service.

use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::{EndpointResponse, UpsertEndpointRequest};
use crate::validation::validate_delivery_url;
use event_inbox_db::models::{Endpoint, UpsertEndpoint};

/// Service for endpoint upserts.
#[derive(Clone)]
pub struct EndpointService {
    pool: PgPool,
}

impl EndpointService {
    /// Create a new endpoint service.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert keyed on `(tenant_id, endpoint_id)`.
    ///
    /// Absent optionals resolve to the defaults (enabled, 12 attempts, 5 s
    /// initial backoff, 600 s cap). The response reflects the stored row, so
    /// `signing_secret_set` stays truthful when an upsert without a secret
    /// preserved an earlier one.
    pub async fn upsert(
        &self,
        tenant_id: &str,
        endpoint_id: &str,
        request: UpsertEndpointRequest,
    ) -> Result<EndpointResponse, ApiError> {
        validate_delivery_url(&request.delivery_url)?;

        let row = Endpoint::upsert(
            &self.pool,
            UpsertEndpoint {
                tenant_id: tenant_id.to_string(),
                endpoint_id: endpoint_id.to_string(),
                delivery_url: request.delivery_url,
                enabled: request.enabled.unwrap_or(true),
                signing_secret: request.signing_secret.unwrap_or_default(),
                max_attempts: positive_or(request.max_attempts, Endpoint::DEFAULT_MAX_ATTEMPTS),
                initial_backoff_seconds: positive_or(
                    request.initial_backoff_seconds,
                    Endpoint::DEFAULT_INITIAL_BACKOFF_SECONDS,
                ),
                max_backoff_seconds: positive_or(
                    request.max_backoff_seconds,
                    Endpoint::DEFAULT_MAX_BACKOFF_SECONDS,
                ),
            },
        )
        .await?;

        tracing::info!(
            target: "admin",
            tenant_id,
            endpoint_id,
            enabled = row.enabled,
            "Upserted endpoint"
        );

        Ok(EndpointResponse::from(row))
    }
}

fn positive_or(value: Option<i32>, default: i32) -> i32 {
    match value {
        Some(n) if n > 0 => n,
        _ => default,
    }
}
