use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

/// One-shot expiry timers for unpaid holds.
///
/// When a timer fires the booking id is pushed onto a channel; whoever owns the
/// receiving end (see `BookingManager::spawn_expiry_listener`) decides whether the
/// booking is still pending. Timers live only in memory, so the `Sweeper` has to
/// run as well.
pub struct HoldManager {
    timers: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
    expired_tx: mpsc::UnboundedSender<Uuid>,
}

impl HoldManager {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let manager = Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            expired_tx,
        };
        (manager, expired_rx)
    }

    /// Arrange for `booking_id` to be reported expired after `hold`.
    /// Rescheduling replaces any timer already running for the booking.
    pub async fn schedule_expiry(&self, booking_id: Uuid, hold: Duration) {
        let timers = self.timers.clone();
        let expired_tx = self.expired_tx.clone();

        let mut guard = self.timers.lock().await;
        let task = tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            timers.lock().await.remove(&booking_id);
            debug!(booking_id = %booking_id, "hold timer fired");
            // Receiver gone means the process is shutting down
            let _ = expired_tx.send(booking_id);
        });

        if let Some(previous) = guard.insert(booking_id, task.abort_handle()) {
            previous.abort();
        }
    }

    /// Returns whether a live timer was cancelled.
    pub async fn cancel_expiry(&self, booking_id: Uuid) -> bool {
        match self.timers.lock().await.remove(&booking_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub async fn scheduled_count(&self) -> usize {
        self.timers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_hold() {
        let (holds, mut rx) = HoldManager::new();
        let booking_id = Uuid::new_v4();

        holds.schedule_expiry(booking_id, Duration::from_secs(600)).await;
        assert_eq!(holds.scheduled_count().await, 1);

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(rx.try_recv().is_err());

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(fired, Some(booking_id));
        assert_eq!(holds.scheduled_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (holds, mut rx) = HoldManager::new();
        let booking_id = Uuid::new_v4();

        holds.schedule_expiry(booking_id, Duration::from_secs(60)).await;
        assert!(holds.cancel_expiry(booking_id).await);
        assert!(!holds.cancel_expiry(booking_id).await);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }
}
