//! Inbound payment gateway events: signature check, then translation into the
//! three transitions the booking engine cares about.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("no matching signature")]
    Mismatch,
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Verifies Stripe-style `t=<unix>,v1=<hex hmac>` signature headers, where the
/// HMAC-SHA256 covers `"<t>.<raw body>"`.
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self { secret: secret.into(), tolerance }
    }

    pub fn verify(&self, payload: &[u8], header: &str, now: DateTime<Utc>) -> Result<(), SignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }
        if (now.timestamp() - timestamp).abs() > self.tolerance.num_seconds() {
            return Err(SignatureError::Stale);
        }

        let mac = self.mac(payload, timestamp)?;
        for candidate in candidates {
            let Ok(expected) = hex::decode(candidate) else { continue };
            if mac.clone().verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
        Err(SignatureError::Mismatch)
    }

    /// Builds a header the way the gateway would. Handy for tests and local tooling.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let digest = self.mac(payload, timestamp)?.finalize().into_bytes();
        Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
    }

    fn mac(&self, payload: &[u8], timestamp: i64) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentSucceeded { booking_id: Uuid },
    SessionExpired { booking_id: Uuid },
    PaymentFailed { booking_id: Uuid },
    /// Anything we do not act on; acknowledged so the gateway stops retrying.
    Ignored { event_type: String },
}

#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub event_id: String,
    pub event: GatewayEvent,
}

#[derive(Debug, Deserialize)]
struct StripeWebhook {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: EventObject,
}

/// Covers both checkout sessions and payment intents; only the fields we read.
#[derive(Debug, Deserialize)]
struct EventObject {
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl EventObject {
    fn booking_id(&self) -> Option<Uuid> {
        let from_metadata = self
            .metadata
            .as_ref()
            .and_then(|m| m.get("booking_id"))
            .and_then(|v| v.as_str());
        from_metadata
            .or(self.client_reference_id.as_deref())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

pub fn parse_event(payload: &[u8]) -> Result<WebhookEnvelope, SignatureError> {
    let webhook: StripeWebhook =
        serde_json::from_slice(payload).map_err(|e| SignatureError::InvalidPayload(e.to_string()))?;

    let object = &webhook.data.object;
    let ignored = || GatewayEvent::Ignored { event_type: webhook.type_.clone() };

    let event = match (webhook.type_.as_str(), object.booking_id()) {
        ("checkout.session.completed", Some(booking_id)) if object.payment_status.as_deref() == Some("paid") => {
            GatewayEvent::PaymentSucceeded { booking_id }
        }
        ("checkout.session.async_payment_succeeded", Some(booking_id)) => GatewayEvent::PaymentSucceeded { booking_id },
        ("checkout.session.expired", Some(booking_id)) => GatewayEvent::SessionExpired { booking_id },
        ("checkout.session.async_payment_failed" | "payment_intent.payment_failed", Some(booking_id)) => {
            GatewayEvent::PaymentFailed { booking_id }
        }
        (
            "checkout.session.completed"
            | "checkout.session.async_payment_succeeded"
            | "checkout.session.expired"
            | "checkout.session.async_payment_failed"
            | "payment_intent.payment_failed",
            None,
        ) => {
            warn!(event_id = %webhook.id, event_type = %webhook.type_, "gateway event carries no booking id");
            ignored()
        }
        _ => ignored(),
    };

    Ok(WebhookEnvelope { event_id: webhook.id, event })
}
