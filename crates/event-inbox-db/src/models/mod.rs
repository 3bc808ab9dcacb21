//! Row models and their queries.

pub mod delivery;
pub mod endpoint;
pub mod webhook_event;

pub use delivery::{ClaimedJob, CreateDelivery, Delivery};
pub use endpoint::{Endpoint, UpsertEndpoint};
pub use webhook_event::{CreateWebhookEvent, WebhookEvent};
