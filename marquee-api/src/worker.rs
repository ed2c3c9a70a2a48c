use marquee_booking::{BookingManager, Sweeper};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::metrics::Metrics;

/// Starts the hold-expiry listener and the periodic sweeper.
pub async fn start_background_workers(manager: Arc<BookingManager>, metrics: Arc<Metrics>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if let Some(listener) = manager.spawn_expiry_listener().await {
        info!("Hold expiry listener started");
        handles.push(listener);
    }

    let every = manager.rules().sweep_interval();
    let sweeper = Sweeper::new(manager);
    handles.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Hold sweeper started, running every {:?}", every);
        loop {
            ticker.tick().await;
            let report = sweeper.run_once(chrono::Utc::now()).await;
            metrics.holds_swept.inc_by(report.expired as u64);
        }
    }));

    handles
}
