//! Ingress handler: accepts inbound webhooks from providers.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::models::IngestResponse;
use crate::router::AppState;

/// Raw request body, capped by the route's body limit.
///
/// Delegates to the `Bytes` extractor so the `DefaultBodyLimit` on the
/// ingress route is enforced, but converts its rejections into [`ApiError`].
/// An oversized payload then gets the same JSON error body as every other
/// failure instead of axum's plain-text 413.
pub struct RawBody(pub Bytes);

#[async_trait]
impl FromRequest<AppState> for RawBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        match Bytes::from_request(req, state).await {
            Ok(bytes) => Ok(Self(bytes)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(ApiError::PayloadTooLarge {
                    limit: state.max_body_bytes,
                })
            }
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}

/// Accept an inbound webhook and enqueue its delivery.
///
/// The body is opaque; it is stored encrypted and forwarded verbatim at
/// delivery time.
#[utoipa::path(
    post,
    path = "/v1/ingress/{provider}/{tenant_id}/{endpoint_id}",
    tag = "Ingress",
    params(
        ("provider" = String, Path, description = "Provider tag, e.g. stripe"),
        ("tenant_id" = String, Path, description = "Tenant identifier"),
        ("endpoint_id" = String, Path, description = "Endpoint identifier"),
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Event stored and delivery enqueued", body = IngestResponse),
        (status = 400, description = "Missing path parameters", body = ErrorResponse),
        (status = 413, description = "Body exceeds the configured limit", body = ErrorResponse),
        (status = 500, description = "Encryption, storage, or database failure", body = ErrorResponse),
    )
)]
pub async fn ingest_handler(
    State(state): State<AppState>,
    Path((provider, tenant_id, endpoint_id)): Path<(String, String, String)>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawBody(body): RawBody,
) -> ApiResult<Json<IngestResponse>> {
    if provider.is_empty() || tenant_id.is_empty() || endpoint_id.is_empty() {
        return Err(ApiError::Validation("missing path params".to_string()));
    }

    let response = state
        .ingest_service
        .ingest(&provider, &tenant_id, &endpoint_id, &headers, peer, &body)
        .await?;

    Ok(Json(response))
}
