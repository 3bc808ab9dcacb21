//! Admin handler for endpoint registration.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use validator::Validate;

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::models::{EndpointResponse, UpsertEndpointRequest};
use crate::router::AppState;

/// Upsert an endpoint registration.
#[utoipa::path(
    post,
    path = "/v1/endpoints/{tenant_id}/{endpoint_id}",
    tag = "Endpoints",
    params(
        ("tenant_id" = String, Path, description = "Tenant identifier"),
        ("endpoint_id" = String, Path, description = "Endpoint identifier"),
    ),
    request_body = UpsertEndpointRequest,
    responses(
        (status = 200, description = "Resolved endpoint registration", body = EndpointResponse),
        (status = 400, description = "Missing or invalid body", body = ErrorResponse),
        (status = 500, description = "Database failure", body = ErrorResponse),
    )
)]
pub async fn upsert_endpoint_handler(
    State(state): State<AppState>,
    Path((tenant_id, endpoint_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<EndpointResponse>> {
    if tenant_id.is_empty() || endpoint_id.is_empty() {
        return Err(ApiError::Validation("missing path params".to_string()));
    }

    // Parsed by hand so a malformed or incomplete body is a 400, not the
    // extractor's 415/422.
    let request: UpsertEndpointRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid body: {e}")))?;

    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let response = state
        .endpoint_service
        .upsert(&tenant_id, &endpoint_id, request)
        .await?;

    Ok(Json(response))
}
