use marquee_core::repository::ProcessedEventLog;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::BookingResult;
use crate::manager::{BookingManager, TransitionOutcome};
use crate::webhook::WebhookEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event id was already applied; nothing was dispatched.
    Duplicate,
    Dispatched(TransitionOutcome),
}

/// Applies authenticated gateway events at most once per event id.
///
/// An id is recorded only after its transition has been stored, so a delivery
/// that dies halfway is processed again on redelivery. Two concurrent copies of
/// the same event may both dispatch; the state machine absorbs the second.
pub struct WebhookInbox {
    manager: Arc<BookingManager>,
    processed: Option<Arc<dyn ProcessedEventLog>>,
}

impl WebhookInbox {
    pub fn new(manager: Arc<BookingManager>, processed: Option<Arc<dyn ProcessedEventLog>>) -> Self {
        Self { manager, processed }
    }

    pub async fn deliver(&self, envelope: WebhookEnvelope) -> BookingResult<Delivery> {
        let WebhookEnvelope { event_id, event } = envelope;

        if let Some(log) = &self.processed {
            match log.contains(&event_id).await {
                Ok(true) => {
                    debug!(event_id = %event_id, "duplicate webhook delivery");
                    return Ok(Delivery::Duplicate);
                }
                Ok(false) => {}
                Err(e) => warn!("Webhook de-duplication unavailable: {}", e),
            }
        }

        let outcome = self.manager.handle_gateway_event(event).await?;

        if let Some(log) = &self.processed {
            if let Err(e) = log.record(&event_id).await {
                warn!(event_id = %event_id, "Could not record processed webhook: {}", e);
            }
        }
        Ok(Delivery::Dispatched(outcome))
    }
}
