use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{BackendClient, check_status};
use crate::error::GarnerError;

const TOPIC_CAPACITY: usize = 64;

/// An ephemeral signal on a named topic. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BroadcastEvent {
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

/// Topic-keyed publish/subscribe shared by every view in the process.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<BroadcastEvent>>>>,
    relay: Option<BackendClient>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that also forwards every published event to the backend realtime API.
    pub fn with_relay(client: BackendClient) -> Self {
        Self {
            relay: Some(client),
            ..Self::default()
        }
    }

    /// Listen for `event` on `topic`. Dropping the subscription unsubscribes.
    pub fn subscribe(&self, topic: &str, event: &str) -> Subscription {
        let rx = self.sender(topic).subscribe();
        debug!(topic, event, "broadcast subscription opened");
        Subscription {
            rx,
            topic: topic.to_string(),
            event: event.to_string(),
        }
    }

    /// Deliver to local subscribers, then relay. Returns the local receiver count.
    pub async fn publish(
        &self,
        topic: &str,
        event: &str,
        payload: Value,
    ) -> Result<usize, GarnerError> {
        let msg = BroadcastEvent {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
        };
        let delivered = self.sender(topic).send(msg.clone()).unwrap_or(0);
        debug!(topic, event, delivered, "broadcast published");

        if let Some(client) = &self.relay
            && let Err(e) = relay(client, &msg).await
        {
            warn!(topic, event, error = %e, "broadcast relay failed");
        }
        Ok(delivered)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BroadcastEvent> {
        if let Some(tx) = self
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
        {
            return tx.clone();
        }
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

/// A live registration for one event on one topic.
pub struct Subscription {
    rx: broadcast::Receiver<BroadcastEvent>,
    topic: String,
    event: String,
}

impl Subscription {
    /// Wait for the next matching event; `None` once the hub is gone.
    ///
    /// Falling behind yields a synthetic event so missed signals are not lost.
    pub async fn next(&mut self) -> Option<BroadcastEvent> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if msg.event == self.event => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "broadcast subscriber lagged");
                    return Some(BroadcastEvent {
                        topic: self.topic.clone(),
                        event: self.event.clone(),
                        payload: Value::Null,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

async fn relay(client: &BackendClient, msg: &BroadcastEvent) -> Result<(), GarnerError> {
    let body = json!({
        "messages": [{
            "topic": msg.topic,
            "event": msg.event,
            "payload": msg.payload,
        }]
    });
    let resp = client
        .http()
        .post(client.endpoint("realtime/v1/api/broadcast")?)
        .bearer_auth(client.anon_key())
        .json(&body)
        .send()
        .await?;
    check_status(resp).await?;
    Ok(())
}
