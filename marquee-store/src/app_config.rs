use marquee_core::BookingRules;
use marquee_shared::Masked;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Without Redis, rate limiting and webhook de-duplication are skipped.
    pub redis: Option<RedisConfig>,
    /// Without Kafka, notifications only go to the log.
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingRules,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Masked<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Mock,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    pub provider: PaymentProvider,
    #[serde(default = "empty_secret")]
    pub secret_key: Masked<String>,
    pub webhook_secret: Masked<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub success_url: String,
    pub failure_url: String,
    #[serde(default = "default_min_charge")]
    pub min_charge_minor: i64,
    #[serde(default = "default_checkout_expiry")]
    pub checkout_expiry_seconds: i64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_tolerance")]
    pub signature_tolerance_seconds: i64,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: usize,
    #[serde(default = "default_breaker_reset")]
    pub breaker_reset_seconds: u64,
}

fn empty_secret() -> Masked<String> { Masked(String::new()) }
fn default_api_base() -> String { "https://api.stripe.com".to_string() }
fn default_min_charge() -> i64 { 5000 }
fn default_checkout_expiry() -> i64 { 1800 }
fn default_request_timeout() -> u64 { 10 }
fn default_tolerance() -> i64 { 300 }
fn default_breaker_threshold() -> usize { 5 }
fn default_breaker_reset() -> u64 { 30 }

impl PaymentsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn breaker_reset(&self) -> Duration {
        Duration::from_secs(self.breaker_reset_seconds)
    }

    pub fn checkout_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.checkout_expiry_seconds)
    }

    pub fn signature_tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.signature_tolerance_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests: 100, window_seconds: 60 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, e.g. config/production.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // MARQUEE__PAYMENTS__WEBHOOK_SECRET=... sets payments.webhook_secret
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        self.booking.validate().map_err(config::ConfigError::Message)
    }
}
