//! Multi-tenant webhook inbox.
//!
//! Accepts inbound HTTP callbacks from third-party providers, records them
//! durably (payload encrypted at rest in a blob store, metadata in
//! `PostgreSQL`), and re-delivers each event to a registered customer
//! endpoint with exponential backoff and optional HMAC-SHA256 signing.
//!
//! ## Guarantees
//! - No accepted event is ever lost: the event row and its delivery row are
//!   inserted in one transaction
//! - At-least-once delivery; receivers dedup on `X-Event-Inbox-Event-ID`
//! - At most one worker acts on a delivery at a time (`SKIP LOCKED` claims)
//!
//! ## Non-Guarantees
//! - Ordering across events
//! - Exactly-once delivery
//!
//! The relational store is the queue. There is no broker to operate, and a
//! `failed` row is its own dead letter.

pub mod blob;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod router;
pub mod services;
pub mod validation;
pub mod worker;

pub use blob::{BlobConfig, BlobStore};
pub use crypto::PayloadCipher;
pub use error::{ApiError, ApiResult};
pub use models::DeliveryStatus;
pub use openapi::ApiDoc;
pub use router::{inbox_router, AppState};
pub use services::delivery_service::DeliveryService;
pub use services::endpoint_service::EndpointService;
pub use services::ingest_service::IngestService;
pub use worker::DeliveryWorker;
