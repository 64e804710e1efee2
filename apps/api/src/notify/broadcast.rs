//! Realtime fan-out over redis pub/sub. Each party listens on its own private channel.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use tracing::debug;

use crate::notify::NotifyError;

/// Envelope published on a private channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BroadcastPayload {
    pub event: &'static str,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, channel: &str, payload: &BroadcastPayload) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct RedisBroadcaster {
    conn: MultiplexedConnection,
}

impl RedisBroadcaster {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, channel: &str, payload: &BroadcastPayload) -> Result<(), NotifyError> {
        let body = serde_json::to_string(payload)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(|e| NotifyError::Broadcast(e.to_string()))?;
        debug!("Published {} to {channel} ({receivers} subscribers)", payload.event);
        Ok(())
    }
}
