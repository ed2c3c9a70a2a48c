use async_trait::async_trait;
use marquee_core::notify::Notifier;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::models::events::{BookingCancelledEvent, BookingConfirmedEvent, PaymentFailedEvent};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

pub const TOPIC_BOOKING_CONFIRMED: &str = "booking.confirmed";
pub const TOPIC_BOOKING_CANCELLED: &str = "booking.cancelled";
pub const TOPIC_PAYMENT_FAILED: &str = "booking.payment_failed";

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    /// Events are keyed by booking id so one booking's events stay ordered.
    async fn publish_json<T: Serialize + Sync>(&self, topic: &str, key: &str, event: &T) -> CoreResult<()> {
        let payload = serde_json::to_string(event).map_err(|e| CoreError::NotificationError(e.to_string()))?;
        self.publish(topic, key, &payload)
            .await
            .map_err(|e| CoreError::NotificationError(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EventProducer {
    async fn booking_confirmed(&self, event: BookingConfirmedEvent) -> CoreResult<()> {
        self.publish_json(TOPIC_BOOKING_CONFIRMED, &event.booking_id.to_string(), &event).await
    }

    async fn booking_cancelled(&self, event: BookingCancelledEvent) -> CoreResult<()> {
        self.publish_json(TOPIC_BOOKING_CANCELLED, &event.booking_id.to_string(), &event).await
    }

    async fn payment_failed(&self, event: PaymentFailedEvent) -> CoreResult<()> {
        self.publish_json(TOPIC_PAYMENT_FAILED, &event.booking_id.to_string(), &event).await
    }
}
