//! Database layer for the event inbox.
//!
//! Provides the `PostgreSQL` connection pool, embedded schema migrations, and
//! the row models (`Endpoint`, `WebhookEvent`, `Delivery`) together with
//! their queries. The deliveries table doubles as the delivery queue; there
//! is no broker in front of it.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{DbPool, DbPoolOptions};
