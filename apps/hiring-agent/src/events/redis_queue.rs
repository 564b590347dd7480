use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::info;

use super::{QueueError, RecheckQueue, RecheckRequest};

pub const RECHECK_QUEUE_KEY: &str = "hiring:recheck";

/// FIFO list in Redis: LPUSH to enqueue, BRPOP to consume.
///
/// BRPOP blocks its connection, so consumers get their own connection and producers
/// share a second one.
pub struct RedisRecheckQueue {
    producer: MultiplexedConnection,
    consumer: Mutex<MultiplexedConnection>,
}

impl RedisRecheckQueue {
    pub async fn connect(client: &redis::Client) -> Result<Self, QueueError> {
        let producer = client.get_multiplexed_async_connection().await?;
        let consumer = client.get_multiplexed_async_connection().await?;
        info!("Re-check queue connected ({})", RECHECK_QUEUE_KEY);
        Ok(Self {
            producer,
            consumer: Mutex::new(consumer),
        })
    }
}

#[async_trait]
impl RecheckQueue for RedisRecheckQueue {
    async fn enqueue(&self, request: &RecheckRequest) -> Result<(), QueueError> {
        let payload = serde_json::to_string(request)?;
        let mut conn = self.producer.clone();
        redis::cmd("LPUSH")
            .arg(RECHECK_QUEUE_KEY)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn next(&self, timeout: Duration) -> Result<Option<RecheckRequest>, QueueError> {
        let mut conn = self.consumer.lock().await;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(RECHECK_QUEUE_KEY)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut *conn)
            .await?;

        match popped {
            Some((_key, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
