//! Request/response types and the delivery status enum.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use event_inbox_db::models::Endpoint;

// ---------------------------------------------------------------------------
// DeliveryStatus enum
// ---------------------------------------------------------------------------

/// State of a delivery attempt chain.
///
/// `Delivered` and `Failed` are terminal; a row never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivering,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "delivering" => Some(Self::Delivering),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for upserting an endpoint registration.
///
/// Optional fields distinguish "absent" from an explicit value; absent
/// integers and booleans resolve to the stored defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpsertEndpointRequest {
    /// Target URL for re-delivery; absolute http(s).
    #[validate(length(
        min = 1,
        max = 2000,
        message = "delivery_url must be between 1 and 2000 characters"
    ))]
    pub delivery_url: String,

    /// Defaults to true when absent.
    pub enabled: Option<bool>,

    /// Shared secret for HMAC-SHA256 signing. Empty or absent preserves the
    /// stored secret.
    #[validate(length(max = 255, message = "signing_secret cannot exceed 255 characters"))]
    pub signing_secret: Option<String>,

    #[validate(range(min = 1, message = "max_attempts must be positive"))]
    pub max_attempts: Option<i32>,

    #[validate(range(min = 1, message = "initial_backoff_seconds must be positive"))]
    pub initial_backoff_seconds: Option<i32>,

    #[validate(range(min = 1, message = "max_backoff_seconds must be positive"))]
    pub max_backoff_seconds: Option<i32>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Resolved endpoint registration. Never carries the signing secret itself.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EndpointResponse {
    pub tenant_id: String,
    pub endpoint_id: String,
    pub delivery_url: String,
    pub enabled: bool,
    pub max_attempts: i32,
    pub initial_backoff_seconds: i32,
    pub max_backoff_seconds: i32,
    pub signing_secret_set: bool,
}

impl From<Endpoint> for EndpointResponse {
    fn from(row: Endpoint) -> Self {
        Self {
            tenant_id: row.tenant_id,
            endpoint_id: row.endpoint_id,
            delivery_url: row.delivery_url,
            enabled: row.enabled,
            max_attempts: row.max_attempts,
            initial_backoff_seconds: row.initial_backoff_seconds,
            max_backoff_seconds: row.max_backoff_seconds,
            signing_secret_set: !row.signing_secret.is_empty(),
        }
    }
}

/// Acknowledgement for an accepted inbound event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub event_id: Uuid,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&DeliveryStatus::Delivering).unwrap();
        assert_eq!(json, "\"delivering\"");
    }

    #[test]
    fn test_status_as_str_roundtrip() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Delivering,
            DeliveryStatus::Delivered,
            DeliveryStatus::Failed,
        ] {
            assert_eq!(DeliveryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DeliveryStatus::parse("abandoned"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Delivering.is_terminal());
    }

    #[test]
    fn test_upsert_request_absent_optionals() {
        let req: UpsertEndpointRequest =
            serde_json::from_str(r#"{"delivery_url": "https://example.com/hook"}"#).unwrap();
        assert_eq!(req.delivery_url, "https://example.com/hook");
        assert!(req.enabled.is_none());
        assert!(req.signing_secret.is_none());
        assert!(req.max_attempts.is_none());
    }

    #[test]
    fn test_upsert_request_rejects_empty_url() {
        let req: UpsertEndpointRequest =
            serde_json::from_str(r#"{"delivery_url": ""}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_upsert_request_rejects_non_positive_attempts() {
        let req: UpsertEndpointRequest = serde_json::from_str(
            r#"{"delivery_url": "https://example.com/hook", "max_attempts": 0}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_endpoint_response_hides_secret() {
        let json = serde_json::to_value(EndpointResponse {
            tenant_id: "tA".into(),
            endpoint_id: "eA".into(),
            delivery_url: "https://example.com/hook".into(),
            enabled: true,
            max_attempts: 12,
            initial_backoff_seconds: 5,
            max_backoff_seconds: 600,
            signing_secret_set: true,
        })
        .unwrap();
        assert_eq!(json["signing_secret_set"], true);
        assert!(json.get("signing_secret").is_none());
    }
}
