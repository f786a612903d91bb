use std::collections::VecDeque;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::utils::error::{AppError, Result};

/// File d'attente des transcripts d'utilisateurs existants
#[async_trait]
pub trait TranscriptQueue: Send + Sync {
    /// Ajoute un transcript en fin de file
    async fn push(&self, payload: &Value) -> Result<()>;

    /// Retire le plus ancien transcript, `None` si la file est vide
    async fn pop(&self) -> Result<Option<Value>>;

    async fn len(&self) -> Result<usize>;

    /// Nom affiché dans les logs
    fn name(&self) -> &str;
}

/// File Redis (RPUSH / LPOP sur une liste)
#[derive(Clone)]
pub struct RedisQueue {
    connection: MultiplexedConnection,
    queue_name: String,
}

impl RedisQueue {
    pub async fn new(redis_url: &str, queue_name: &str) -> Result<Self> {
        info!("🔧 Initialisation de la file Redis {}...", queue_name);

        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Configuration(format!("REDIS_URL invalide: {}", e)))?;
        let mut connection = client.get_multiplexed_tokio_connection().await.map_err(|e| {
            AppError::Queue(format!("Impossible de se connecter à Redis: {}", e))
        })?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await?;

        info!("✅ File Redis initialisée");
        Ok(Self {
            connection,
            queue_name: queue_name.to_string(),
        })
    }
}

#[async_trait]
impl TranscriptQueue for RedisQueue {
    async fn push(&self, payload: &Value) -> Result<()> {
        let body = serde_json::to_string(payload)?;
        let mut connection = self.connection.clone();
        redis::cmd("RPUSH")
            .arg(&self.queue_name)
            .arg(body)
            .query_async::<_, i64>(&mut connection)
            .await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Value>> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = redis::cmd("LPOP")
            .arg(&self.queue_name)
            .query_async(&mut connection)
            .await?;

        raw.map(|body| serde_json::from_str(&body).map_err(AppError::from))
            .transpose()
    }

    async fn len(&self) -> Result<usize> {
        let mut connection = self.connection.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(&self.queue_name)
            .query_async(&mut connection)
            .await?;
        Ok(len)
    }

    fn name(&self) -> &str {
        &self.queue_name
    }
}

/// File en mémoire, utilisée sans Redis
pub struct MemoryQueue {
    queue_name: String,
    items: Mutex<VecDeque<Value>>,
}

impl MemoryQueue {
    pub fn new(queue_name: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            items: Mutex::new(VecDeque::new()),
        }
    }
}

#[async_trait]
impl TranscriptQueue for MemoryQueue {
    async fn push(&self, payload: &Value) -> Result<()> {
        self.items.lock().await.push_back(payload.clone());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Value>> {
        Ok(self.items.lock().await.pop_front())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.items.lock().await.len())
    }

    fn name(&self) -> &str {
        &self.queue_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_queue_is_fifo() {
        let queue = MemoryQueue::new("existing-user-transcripts");
        queue.push(&json!({"n": 1})).await.unwrap();
        queue.push(&json!({"n": 2})).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 2);
        assert_eq!(queue.pop().await.unwrap(), Some(json!({"n": 1})));
        assert_eq!(queue.pop().await.unwrap(), Some(json!({"n": 2})));
        assert_eq!(queue.pop().await.unwrap(), None);
        assert_eq!(queue.name(), "existing-user-transcripts");
    }
}
