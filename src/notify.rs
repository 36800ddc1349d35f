//! Privilege change announcements.
//!
//! With `notify.redis_url` set, changes are published as JSON on a Redis
//! pub/sub channel. Otherwise they go to an in-process broadcast channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::scheduler::PrivilegeLevel;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The relay's level in a channel changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivilegeChange {
    pub channel: String,
    pub level: PrivilegeLevel,
    pub previous: PrivilegeLevel,
    pub at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: &'a T,
}

/// Wire form: `{"type":"privilege_change","data":{...}}`.
pub fn encode(change: &PrivilegeChange) -> Result<String, NotifyError> {
    Ok(serde_json::to_string(&Envelope {
        kind: "privilege_change",
        data: change,
    })?)
}

#[async_trait]
pub trait PrivilegeNotifier: Send + Sync + 'static {
    async fn publish(&self, change: &PrivilegeChange) -> Result<(), NotifyError>;
}

/// Publishes on a Redis channel.
pub struct RedisNotifier {
    conn: redis::aio::ConnectionManager,
    topic: String,
}

impl RedisNotifier {
    pub async fn connect(url: &str, topic: String) -> Result<Self, NotifyError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, topic })
    }
}

#[async_trait]
impl PrivilegeNotifier for RedisNotifier {
    async fn publish(&self, change: &PrivilegeChange) -> Result<(), NotifyError> {
        let payload = encode(change)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&self.topic, payload).await?;
        debug!(topic = %self.topic, receivers, channel = %change.channel, "Published privilege change");
        Ok(())
    }
}

/// In-process fan-out of privilege changes.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PrivilegeChange>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PrivilegeChange> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl PrivilegeNotifier for BroadcastNotifier {
    async fn publish(&self, change: &PrivilegeChange) -> Result<(), NotifyError> {
        // no subscribers is fine
        let _ = self.tx.send(change.clone());
        Ok(())
    }
}
