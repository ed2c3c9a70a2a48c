use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::payment::{CheckoutRequest, CheckoutSession, PaymentGateway};
use marquee_core::{CoreError, CoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::resiliency::CircuitBreaker;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// May contain `{booking_id}`, substituted per booking.
    pub success_url: String,
    pub failure_url: String,
    pub min_charge_minor: i64,
    pub checkout_expiry: chrono::Duration,
    pub request_timeout: Duration,
    pub breaker_threshold: usize,
    pub breaker_reset: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            success_url: "http://localhost:3000/bookings/{booking_id}/success".to_string(),
            failure_url: "http://localhost:3000/bookings/{booking_id}/failed".to_string(),
            min_charge_minor: 5000,
            checkout_expiry: chrono::Duration::minutes(30),
            request_timeout: Duration::from_secs(10),
            breaker_threshold: 5,
            breaker_reset: Duration::from_secs(30),
        }
    }
}

/// Whole currency units to the gateway's smallest unit.
pub fn to_minor_units(amount: i64) -> i64 {
    amount.saturating_mul(100)
}

/// What the gateway is asked to charge. The booking keeps its own amount.
pub fn chargeable_minor(amount: i64, min_charge_minor: i64) -> i64 {
    to_minor_units(amount).max(min_charge_minor)
}

pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    breaker: CircuitBreaker,
    settings: CheckoutSettings,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, settings: CheckoutSettings) -> Self {
        let breaker = CircuitBreaker::new("checkout", settings.breaker_threshold, settings.breaker_reset);
        Self { gateway, breaker, settings }
    }

    /// Open a hosted checkout session for a booking.
    ///
    /// An open circuit, a timeout and a gateway error all come back as
    /// `CoreError::GatewayError`; the caller owns the release-on-failure path.
    pub async fn open_checkout(
        &self,
        booking_id: Uuid,
        amount: i64,
        currency: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<CheckoutSession> {
        if !self.breaker.check().await {
            return Err(CoreError::GatewayError(format!("circuit [{}] is open", self.breaker.name)));
        }

        let id = booking_id.to_string();
        let request = CheckoutRequest {
            booking_id,
            amount_minor: chargeable_minor(amount, self.settings.min_charge_minor),
            currency: currency.to_lowercase(),
            description: format!("Booking {}", booking_id),
            success_url: self.settings.success_url.replace("{booking_id}", &id),
            failure_url: self.settings.failure_url.replace("{booking_id}", &id),
            expires_at: now + self.settings.checkout_expiry,
        };

        let result = tokio::time::timeout(self.settings.request_timeout, self.gateway.create_checkout(&request)).await;
        match result {
            Ok(Ok(session)) => {
                self.breaker.record_success().await;
                Ok(session)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure().await;
                Err(e)
            }
            Err(_) => {
                self.breaker.record_failure().await;
                Err(CoreError::GatewayError(format!(
                    "checkout request timed out after {:?}",
                    self.settings.request_timeout
                )))
            }
        }
    }
}

/// Gateway stand-in for local runs and tests. Remembers every request it saw.
#[derive(Default)]
pub struct MockPaymentGateway {
    fail: bool,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every call errors.
    pub fn unavailable() -> Self {
        Self { fail: true, requests: Mutex::new(Vec::new()) }
    }

    pub async fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> CoreResult<CheckoutSession> {
        self.requests.lock().await.push(request.clone());
        if self.fail {
            return Err(CoreError::GatewayError("simulated gateway outage".to_string()));
        }

        let session_ref = format!("mock_cs_{}_{}", request.booking_id.simple(), Uuid::new_v4().simple());
        Ok(CheckoutSession {
            redirect_url: format!("https://checkout.mock/pay/{}", session_ref),
            session_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_and_clamp() {
        assert_eq!(to_minor_units(1000), 100_000);
        assert_eq!(chargeable_minor(1000, 5000), 100_000);
        // Below the gateway minimum the request is clamped up
        assert_eq!(chargeable_minor(20, 5000), 5000);
    }

    #[tokio::test]
    async fn test_open_checkout_builds_request() {
        let gateway = Arc::new(MockPaymentGateway::new());
        let orchestrator = PaymentOrchestrator::new(gateway.clone(), CheckoutSettings::default());
        let booking_id = Uuid::new_v4();

        let session = orchestrator.open_checkout(booking_id, 10, "INR", Utc::now()).await.unwrap();
        assert!(session.session_ref.starts_with("mock_cs_"));

        let requests = gateway.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount_minor, 5000);
        assert_eq!(requests[0].currency, "inr");
        assert!(requests[0].success_url.contains(&booking_id.to_string()));
    }

    #[tokio::test]
    async fn test_breaker_opens_after_repeated_failures() {
        let gateway = Arc::new(MockPaymentGateway::unavailable());
        let settings = CheckoutSettings { breaker_threshold: 2, ..CheckoutSettings::default() };
        let orchestrator = PaymentOrchestrator::new(gateway.clone(), settings);

        for _ in 0..3 {
            assert!(orchestrator.open_checkout(Uuid::new_v4(), 100, "INR", Utc::now()).await.is_err());
        }
        // Third call failed fast without reaching the gateway
        assert_eq!(gateway.requests().await.len(), 2);
    }
}
