use async_trait::async_trait;
use marquee_core::payment::{CheckoutRequest, CheckoutSession, PaymentGateway};
use marquee_core::{CoreError, CoreResult};
use marquee_shared::Masked;
use serde::Deserialize;
use tracing::{debug, error};

/// Hosted-checkout client for Stripe's `/v1/checkout/sessions` endpoint.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: Masked<String>,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: Masked<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key,
            api_base: api_base.into(),
        }
    }

    /// Form fields for a one-line-item payment session. The booking id rides in
    /// both metadata blocks and `client_reference_id` so every webhook type we
    /// consume can be traced back to the booking.
    fn form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let booking_id = request.booking_id.to_string();
        vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.failure_url.clone()),
            ("expires_at".into(), request.expires_at.timestamp().to_string()),
            ("client_reference_id".into(), booking_id.clone()),
            ("metadata[booking_id]".into(), booking_id.clone()),
            ("payment_intent_data[metadata][booking_id]".into(), booking_id),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), request.currency.clone()),
            ("line_items[0][price_data][unit_amount]".into(), request.amount_minor.to_string()),
            ("line_items[0][price_data][product_data][name]".into(), request.description.clone()),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> CoreResult<CheckoutSession> {
        let url = format!("{}/v1/checkout/sessions", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .basic_auth(self.secret_key.expose(), None::<&str>)
            .form(&Self::form(request))
            .send()
            .await
            .map_err(|e| CoreError::GatewayError(format!("checkout request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            error!(booking_id = %request.booking_id, "Stripe rejected checkout ({}): {}", status, message);
            return Err(CoreError::GatewayError(message));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| CoreError::GatewayError(format!("unreadable checkout response: {}", e)))?;
        let redirect_url = session
            .url
            .ok_or_else(|| CoreError::GatewayError(format!("session {} has no redirect url", session.id)))?;

        debug!(booking_id = %request.booking_id, session = %session.id, "checkout session created");
        Ok(CheckoutSession { session_ref: session.id, redirect_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_form_carries_booking_reference() {
        let booking_id = Uuid::new_v4();
        let request = CheckoutRequest {
            booking_id,
            amount_minor: 100_000,
            currency: "inr".to_string(),
            description: "Booking".to_string(),
            success_url: "http://x/ok".to_string(),
            failure_url: "http://x/fail".to_string(),
            expires_at: Utc::now(),
        };

        let form = StripeGateway::form(&request);
        let get = |key: &str| form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        assert_eq!(get("metadata[booking_id]"), Some(booking_id.to_string().as_str()));
        assert_eq!(get("client_reference_id"), Some(booking_id.to_string().as_str()));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("100000"));
        assert_eq!(get("cancel_url"), Some("http://x/fail"));
    }
}
