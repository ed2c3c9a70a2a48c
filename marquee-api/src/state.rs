use marquee_booking::{BookingManager, WebhookInbox, WebhookVerifier};
use marquee_store::app_config::RateLimitConfig;
use marquee_store::{DbClient, RedisClient};
use std::sync::Arc;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingManager>,
    pub verifier: Arc<WebhookVerifier>,
    pub webhooks: Arc<WebhookInbox>,
    /// `None` in tests and when running without Postgres-backed health checks.
    pub db: Option<Arc<DbClient>>,
    /// Rate limiting only; webhook de-duplication goes through `webhooks`.
    pub redis: Option<Arc<RedisClient>>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}
