use async_trait::async_trait;
use marquee_shared::models::events::{BookingCancelledEvent, BookingConfirmedEvent, PaymentFailedEvent};

use crate::CoreResult;

/// Outbound notification sink. Callers treat every method as fire-and-forget:
/// an error here is logged and never changes booking state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, event: BookingConfirmedEvent) -> CoreResult<()>;

    async fn booking_cancelled(&self, event: BookingCancelledEvent) -> CoreResult<()>;

    async fn payment_failed(&self, event: PaymentFailedEvent) -> CoreResult<()>;
}

/// Used when no broker is configured; just records the event in the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(&self, event: BookingConfirmedEvent) -> CoreResult<()> {
        tracing::info!(booking_id = %event.booking_id, "notify: booking confirmed");
        Ok(())
    }

    async fn booking_cancelled(&self, event: BookingCancelledEvent) -> CoreResult<()> {
        tracing::info!(booking_id = %event.booking_id, refund = event.refund_amount, "notify: booking cancelled");
        Ok(())
    }

    async fn payment_failed(&self, event: PaymentFailedEvent) -> CoreResult<()> {
        tracing::info!(booking_id = %event.booking_id, reason = %event.reason, "notify: payment failed");
        Ok(())
    }
}
