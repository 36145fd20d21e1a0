//! Redis-backed broker implementation.
//!
//! List/set commands run over a single multiplexed connection; each
//! subscription gets its own pub/sub connection pumped into an in-process
//! channel by a background task.

use ::redis::AsyncCommands;
use ::redis::aio::MultiplexedConnection;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vibecall_core::MatchRequest;

use crate::{BrokerError, MatchBroker, Subscription, keys};

impl From<::redis::RedisError> for BrokerError {
    fn from(e: ::redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() {
            Self::Connection(e.to_string())
        } else {
            Self::Command(e.to_string())
        }
    }
}

/// Broker backed by a Redis server.
#[derive(Clone)]
pub struct RedisBroker {
    client: ::redis::Client,
    conn: MultiplexedConnection,
}

impl RedisBroker {
    /// Connect to the broker.
    ///
    /// Fails fast: callers that cannot operate without the broker (the
    /// worker) should propagate this error and refuse to start.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client =
            ::redis::Client::open(url).map_err(|e| BrokerError::Connection(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        info!(url = %url, "Connected to broker");
        Ok(Self { client, conn })
    }

    fn parse_request(raw: &str) -> Option<MatchRequest> {
        match serde_json::from_str::<MatchRequest>(raw) {
            Ok(req) => Some(req),
            Err(e) => {
                warn!(error = %e, "Skipping malformed queue entry");
                None
            }
        }
    }
}

#[async_trait]
impl MatchBroker for RedisBroker {
    async fn enqueue_request(&self, request: &MatchRequest) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(request)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(keys::MATCH_QUEUE, payload).await?;
        Ok(())
    }

    async fn pop_request(&self) -> Result<Option<MatchRequest>, BrokerError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.rpop(keys::MATCH_QUEUE, None).await?;
        Ok(raw.as_deref().and_then(Self::parse_request))
    }

    async fn restore_unmatched(&self, request: &MatchRequest) -> Result<(), BrokerError> {
        self.enqueue_request(request).await
    }

    async fn waiting_requests(&self) -> Result<Vec<MatchRequest>, BrokerError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(keys::MATCH_QUEUE, 0, -1).await?;
        Ok(raw
            .iter()
            .filter_map(|item| Self::parse_request(item))
            .collect())
    }

    async fn remove_request(&self, request_id: &str) -> Result<bool, BrokerError> {
        // LREM matches on the exact serialized value, so locate the raw
        // entry carrying this request id first.
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(keys::MATCH_QUEUE, 0, -1).await?;
        for item in raw {
            let Some(req) = Self::parse_request(&item) else {
                continue;
            };
            if req.request_id == request_id {
                let removed: i64 = conn.lrem(keys::MATCH_QUEUE, 1, item).await?;
                return Ok(removed > 0);
            }
        }
        Ok(false)
    }

    async fn mark_processing(&self, user_id: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(keys::PROCESSING_SET, user_id).await?;
        Ok(())
    }

    async fn clear_processing(&self, user_id: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(keys::PROCESSING_SET, user_id).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel::<String>(64);
        let channel = channel.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping unreadable pub/sub payload");
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
            debug!(channel = %channel, "Pub/sub stream closed");
        });

        Ok(Subscription::new(rx))
    }
}
