use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;
use marquee_booking::webhook::parse_event;
use marquee_booking::{Delivery, GatewayEvent, TransitionOutcome};

use crate::error::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
///
/// 200 for anything handled or deliberately ignored, 400 for unauthenticated or
/// unreadable payloads, 500 when the transition could not be stored so the
/// gateway redelivers.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::ValidationError("Missing signature header".to_string()))?;

    state.verifier.verify(&body, signature, Utc::now()).map_err(|e| {
        tracing::warn!("Rejected webhook: {}", e);
        AppError::ValidationError(e.to_string())
    })?;

    let envelope = parse_event(&body).map_err(|e| AppError::ValidationError(e.to_string()))?;
    tracing::info!(event_id = %envelope.event_id, "Received payment webhook: {:?}", envelope.event);

    let succeeded = matches!(envelope.event, GatewayEvent::PaymentSucceeded { .. });
    let event_id = envelope.event_id.clone();
    match state.webhooks.deliver(envelope).await {
        Ok(delivery) => {
            let label = match (delivery, succeeded) {
                (Delivery::Dispatched(TransitionOutcome::Applied), true) => "confirmed",
                (Delivery::Dispatched(TransitionOutcome::Applied), false) => "failed",
                (Delivery::Dispatched(TransitionOutcome::AlreadyApplied), _) | (Delivery::Duplicate, _) => "duplicate",
                (Delivery::Dispatched(TransitionOutcome::Ignored), _) => "ignored",
            };
            state.metrics.record_payment(label);
            Ok(StatusCode::OK)
        }
        Err(e) => Err(AppError::InternalServerError(format!(
            "webhook {} not applied: {}",
            event_id, e
        ))),
    }
}
