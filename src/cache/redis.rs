use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use tokio::sync::mpsc;

use super::{CacheKey, ModelStore};
use crate::{
    error::{AppError, AppResult},
    services::trainer::FactorModel,
};

/// Creates a Redis client for the model cache
///
/// No connection is made until the first command.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Model store backed by Redis, with writes handed to a background task
#[derive(Clone)]
pub struct RedisStore {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
    ttl_secs: u64,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task and waits until every queued model has been written
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task failed");
        }
    }
}

impl RedisStore {
    /// Creates the store and spawns its writer task
    pub fn new(redis_client: Client, ttl_secs: u64) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let store = Self {
            redis_client,
            write_tx,
            ttl_secs,
        };

        (store, CacheWriterHandle { shutdown_tx, task })
    }

    /// Writes queued models until shutdown, then drains what is left
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    let key = msg.key.clone();
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, key, "Failed to write model to Redis");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush model write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    fn encode(model: &FactorModel) -> AppResult<String> {
        serde_json::to_string(model)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))
    }

    fn decode(json: &str) -> AppResult<FactorModel> {
        serde_json::from_str(json)
            .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))
    }
}

#[async_trait]
impl ModelStore for RedisStore {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<Arc<FactorModel>>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        cached
            .map(|json| Self::decode(&json).map(Arc::new))
            .transpose()
    }

    /// Queues the model for writing and returns immediately
    async fn put(&self, key: &CacheKey, model: Arc<FactorModel>) -> AppResult<()> {
        let msg = CacheWriteMessage {
            key: key.to_string(),
            value: Self::encode(&model)?,
            ttl: self.ttl_secs,
        };

        self.write_tx
            .send(msg)
            .map_err(|e| AppError::Internal(format!("Cache writer is closed: {}", e)))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
