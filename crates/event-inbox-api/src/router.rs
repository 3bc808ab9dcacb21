//! Axum router setup for the inbox surface.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{endpoints, health, ingress};
use crate::services::endpoint_service::EndpointService;
use crate::services::ingest_service::IngestService;

/// Shared state for the inbox handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingest_service: Arc<IngestService>,
    pub endpoint_service: Arc<EndpointService>,
    /// Ingress body ceiling; also enforced by the route's body limit layer.
    pub max_body_bytes: usize,
}

/// Creates the inbox router with all routes.
///
/// The body limit applies to the ingress route only; admin request bodies
/// are not subject to the payload ceiling.
pub fn inbox_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/v1/ingress/:provider/:tenant_id/:endpoint_id",
            post(ingress::ingest_handler).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .route(
            "/v1/endpoints/:tenant_id/:endpoint_id",
            post(endpoints::upsert_endpoint_handler),
        )
        .with_state(state)
}
