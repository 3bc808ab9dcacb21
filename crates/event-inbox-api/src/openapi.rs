//! OpenAPI document for the inbox HTTP surface.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::models::{EndpointResponse, IngestResponse, UpsertEndpointRequest};

/// OpenAPI specification, served at `/docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Event Inbox",
        description = "Multi-tenant webhook inbox: durable capture and reliable re-delivery"
    ),
    paths(
        crate::handlers::health::health_handler,
        crate::handlers::ingress::ingest_handler,
        crate::handlers::endpoints::upsert_endpoint_handler,
    ),
    components(schemas(
        UpsertEndpointRequest,
        EndpointResponse,
        IngestResponse,
        ErrorResponse,
    )),
    tags(
        (name = "Ingress", description = "Inbound webhook capture"),
        (name = "Endpoints", description = "Endpoint registration"),
        (name = "Health", description = "Probes"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.contains(&&"/health".to_string()));
        assert!(paths.contains(&&"/v1/ingress/{provider}/{tenant_id}/{endpoint_id}".to_string()));
        assert!(paths.contains(&&"/v1/endpoints/{tenant_id}/{endpoint_id}".to_string()));
    }
}
