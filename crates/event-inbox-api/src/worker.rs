//! Background delivery worker.
//!
//! Polls the delivery queue once per second and processes at most one due
//! delivery per tick; within a replica there is no internal fan-out.
//! Horizontal scaling is more replicas, and cross-replica safety rests on
//! the `FOR UPDATE SKIP LOCKED` claim.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::services::delivery_service::DeliveryService;

/// Queue poll interval.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Background worker that drains the delivery queue.
pub struct DeliveryWorker {
    delivery_service: DeliveryService,
    cancellation_token: CancellationToken,
}

impl DeliveryWorker {
    /// Create a new delivery worker.
    pub fn new(delivery_service: DeliveryService, cancellation_token: CancellationToken) -> Self {
        Self {
            delivery_service,
            cancellation_token,
        }
    }

    /// Run until cancelled.
    ///
    /// Cancellation mid-attempt drops the in-flight `process_one` without
    /// writing partial state; the claimed row stays `delivering` and due, so
    /// the next replica poll picks it back up. That re-send window is the
    /// at-least-once contract.
    pub async fn run(self) {
        tracing::info!(target: "delivery", "Delivery worker started");

        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    break;
                }
                _ = interval.tick() => {}
            }

            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    break;
                }
                result = self.delivery_service.process_one() => {
                    if let Err(e) = result {
                        tracing::error!(
                            target: "delivery",
                            error = %e,
                            "Failed to process delivery"
                        );
                    }
                }
            }
        }

        tracing::info!(target: "delivery", "Delivery worker stopped");
    }
}
