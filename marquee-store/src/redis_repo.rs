use async_trait::async_trait;
use marquee_core::repository::ProcessedEventLog;
use marquee_core::{CoreError, CoreResult};
use redis::RedisResult;

/// How long a processed webhook event id is remembered.
const WEBHOOK_DEDUP_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns whether the caller is still under `limit`.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

fn webhook_key(event_id: &str) -> String {
    format!("webhook:{}", event_id)
}

#[async_trait]
impl ProcessedEventLog for RedisClient {
    async fn contains(&self, event_id: &str) -> CoreResult<bool> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CoreError::StorageError(e.to_string()))?;
        redis::cmd("EXISTS")
            .arg(webhook_key(event_id))
            .query_async::<bool>(&mut conn)
            .await
            .map_err(|e| CoreError::StorageError(e.to_string()))
    }

    async fn record(&self, event_id: &str) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CoreError::StorageError(e.to_string()))?;
        redis::cmd("SET")
            .arg(webhook_key(event_id))
            .arg(1)
            .arg("EX")
            .arg(WEBHOOK_DEDUP_TTL_SECONDS)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CoreError::StorageError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_keys_are_namespaced() {
        assert_eq!(webhook_key("evt_123"), "webhook:evt_123");
    }
}
