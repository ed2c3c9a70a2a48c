use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

/// Outbound checkout-session request, already in the gateway's units.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub booking_id: Uuid,
    /// Smallest currency unit (paise, cents), clamped to the gateway minimum.
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub failure_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_ref: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session with the provider
    async fn create_checkout(&self, request: &CheckoutRequest) -> CoreResult<CheckoutSession>;
}
