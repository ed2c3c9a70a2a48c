use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Booking counters, registered on a private registry so tests can build as
/// many as they like.
pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub bookings_rejected: IntCounter,
    pub payments: IntCounterVec,
    pub bookings_cancelled: IntCounter,
    pub holds_swept: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created = IntCounter::new("marquee_bookings_created_total", "Bookings that reached pending")?;
        let bookings_rejected = IntCounter::new(
            "marquee_bookings_rejected_total",
            "Booking attempts rejected because seats were taken",
        )?;
        let payments = IntCounterVec::new(
            Opts::new("marquee_payments_total", "Gateway payment outcomes applied to bookings"),
            &["outcome"],
        )?;
        let bookings_cancelled = IntCounter::new("marquee_bookings_cancelled_total", "Paid bookings cancelled")?;
        let holds_swept = IntCounter::new("marquee_holds_swept_total", "Stale holds expired by the sweeper")?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(bookings_rejected.clone()))?;
        registry.register(Box::new(payments.clone()))?;
        registry.register(Box::new(bookings_cancelled.clone()))?;
        registry.register(Box::new(holds_swept.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            bookings_rejected,
            payments,
            bookings_cancelled,
            holds_swept,
        })
    }

    pub fn record_payment(&self, outcome: &str) {
        self.payments.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(format!("metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.bookings_created.inc();
        metrics.record_payment("confirmed");

        let text = metrics.render().unwrap();
        assert!(text.contains("marquee_bookings_created_total 1"));
        assert!(text.contains("marquee_payments_total{outcome=\"confirmed\"} 1"));
    }
}
