use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const QUEUE_KEY: &str = "alt_text:scans";
const PROCESSING_KEY: &str = "alt_text:scans:processing";

/// Scan request serialized into Redis. The worker owns the Scan record
/// lifecycle, so only the dispatch parameters travel through the queue.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedScan {
    pub shop: String,
    pub force_all: bool,
}

/// Redis-backed dispatch queue feeding the scan worker.
///
/// One worker drains this queue sequentially, which is also what keeps two
/// scans from ever running concurrently.
pub struct ScanQueue {
    client: redis::Client,
}

impl ScanQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Enqueue a scan request.
    pub async fn enqueue(&self, scan: &QueuedScan) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(scan).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Pop the next scan request, moving it to the processing list.
    pub async fn dequeue(&self) -> Result<Option<QueuedScan>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let result: Option<String> = conn
            .rpoplpush(QUEUE_KEY, PROCESSING_KEY)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let scan: QueuedScan =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(scan))
            }
            None => Ok(None),
        }
    }

    /// Drop a finished scan request from the processing list.
    pub async fn complete(&self, scan: &QueuedScan) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(scan).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Number of scan requests waiting for the worker.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
