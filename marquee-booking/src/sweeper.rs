use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::manager::{BookingManager, TransitionOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Periodic backstop for holds whose in-process timer never fired
/// (restarts, crashes, timers lost on another replica).
pub struct Sweeper {
    manager: Arc<BookingManager>,
}

impl Sweeper {
    pub fn new(manager: Arc<BookingManager>) -> Self {
        Self { manager }
    }

    /// One pass. A failure on one booking never stops the rest.
    pub async fn run_once(&self, now: DateTime<Utc>) -> SweepReport {
        let stale = match self.manager.stale_holds(now).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("hold sweep could not list stale bookings: {}", e);
                return SweepReport::default();
            }
        };

        let mut report = SweepReport { examined: stale.len(), ..SweepReport::default() };
        for booking_id in stale {
            match self.manager.expire_hold(booking_id).await {
                Ok(TransitionOutcome::Applied) => report.expired += 1,
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    error!(booking_id = %booking_id, "hold sweep could not expire booking: {}", e);
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                expired = report.expired,
                failed = report.failed,
                "hold sweep finished"
            );
        }
        report
    }
}
