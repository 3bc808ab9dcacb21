//! Common test utilities for event-inbox-api integration tests.
//!
//! Provides a capturing wiremock responder and claimed-job fixtures for
//! verifying outbound delivery behavior without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use event_inbox_db::models::ClaimedJob;

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting delivery requests
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and returns success
// ---------------------------------------------------------------------------

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl CaptureResponder {
    /// Create a new capture responder that returns 200 OK.
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let headers = request
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        self.requests.lock().unwrap().push(CapturedRequest {
            body: request.body.clone(),
            headers,
        });

        ResponseTemplate::new(200)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A claimed job pointed at a test sink.
pub fn sink_job(url: &str, secret: &str, content_type: &str) -> ClaimedJob {
    ClaimedJob {
        delivery_id: Uuid::new_v4(),
        event_id: Uuid::new_v4(),
        tenant_id: "tA".to_string(),
        endpoint_id: "eA".to_string(),
        delivery_url: url.to_string(),
        signing_secret: secret.to_string(),
        payload_object_key: "tA/stripe/eA/payload.bin".to_string(),
        content_type: content_type.to_string(),
        attempt_count: 0,
        max_attempts: 12,
        initial_backoff_seconds: 5,
        max_backoff_seconds: 600,
    }
}
