//! Best-effort publication of domain events to NATS.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

/// Subject that order lifecycle events are published on.
pub const ORDER_EVENTS_SUBJECT: &str = "orders.events";

#[derive(Clone, Default)]
pub struct EventBus {
    nats: Option<async_nats::Client>,
}

impl EventBus {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// No broker; events are only logged.
    pub fn disabled() -> Self { Self::default() }

    /// Publishing never fails the caller; errors are logged.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let Some(client) = &self.nats else {
                debug!(?event, "Event bus disabled");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "Failed to encode domain event");
                    continue;
                }
            };
            if let Err(e) = client.publish(ORDER_EVENTS_SUBJECT.to_string(), payload.into()).await {
                warn!(error = %e, "Failed to publish domain event");
            }
        }
    }
}
