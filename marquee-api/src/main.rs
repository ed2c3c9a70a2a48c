use anyhow::Context;
use marquee_api::metrics::Metrics;
use marquee_api::{app, worker, AppState, AuthConfig};
use marquee_booking::{
    BookingManager, CheckoutSettings, MockPaymentGateway, PaymentOrchestrator, WebhookInbox, WebhookVerifier,
};
use marquee_core::notify::{LogNotifier, Notifier};
use marquee_core::payment::PaymentGateway;
use marquee_core::repository::ProcessedEventLog;
use marquee_store::app_config::PaymentProvider;
use marquee_store::{
    Config, DbClient, EventProducer, PgBookingRepository, PgSeatLedger, PgShowCatalog, RedisClient, StripeGateway,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,marquee_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url).await.context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let db = Arc::new(db);

    // Redis (optional)
    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?,
        )),
        None => {
            tracing::warn!("No Redis configured: rate limiting and webhook de-duplication disabled");
            None
        }
    };

    // Kafka (optional)
    let notifier: Arc<dyn Notifier> = match &config.kafka {
        Some(kafka) => Arc::new(EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?),
        None => {
            tracing::warn!("No Kafka configured: notifications go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let payments_cfg = &config.payments;
    let gateway: Arc<dyn PaymentGateway> = match payments_cfg.provider {
        PaymentProvider::Stripe => {
            Arc::new(StripeGateway::new(payments_cfg.secret_key.clone(), payments_cfg.api_base.clone()))
        }
        PaymentProvider::Mock => {
            tracing::warn!("Using the mock payment gateway");
            Arc::new(MockPaymentGateway::new())
        }
    };
    let orchestrator = PaymentOrchestrator::new(
        gateway,
        CheckoutSettings {
            success_url: payments_cfg.success_url.clone(),
            failure_url: payments_cfg.failure_url.clone(),
            min_charge_minor: payments_cfg.min_charge_minor,
            checkout_expiry: payments_cfg.checkout_expiry(),
            request_timeout: payments_cfg.request_timeout(),
            breaker_threshold: payments_cfg.breaker_threshold,
            breaker_reset: payments_cfg.breaker_reset(),
        },
    );

    let manager = Arc::new(BookingManager::new(
        Arc::new(PgBookingRepository::new(db.pool.clone())),
        Arc::new(PgSeatLedger::new(db.pool.clone())),
        Arc::new(PgShowCatalog::new(db.pool.clone())),
        orchestrator,
        notifier,
        config.booking.clone(),
    ));

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    worker::start_background_workers(manager.clone(), metrics.clone()).await;

    let processed = redis.clone().map(|redis| redis as Arc<dyn ProcessedEventLog>);
    let webhooks = Arc::new(WebhookInbox::new(manager.clone(), processed));

    let app_state = AppState {
        bookings: manager,
        verifier: Arc::new(WebhookVerifier::new(
            payments_cfg.webhook_secret.expose().clone(),
            payments_cfg.signature_tolerance(),
        )),
        webhooks,
        db: Some(db),
        redis,
        metrics,
        auth: AuthConfig { secret: config.auth.jwt_secret.expose().clone() },
        rate_limit: config.rate_limit.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind")?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;

    Ok(())
}
