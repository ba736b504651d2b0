use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};

/// Queue topic consumed by the group membership-expansion worker.
pub const GROUP_UPDATE_TOPIC: &str = "queue:group-update";

const TOPIC_CAPACITY: usize = 256;

pub fn user_topic(user_id: &str) -> String {
    format!("deliver:user:{user_id}")
}

pub fn group_topic(group_id: &str) -> String {
    format!("deliver:group:{group_id}")
}

/// Topic-per-recipient pub/sub binding gateway instances together.
///
/// At-most-once, best-effort: a publish with no subscribers is dropped, and a
/// lagging receiver loses the oldest frames. Durability lives in the message
/// log; clients recover by pulling history from their last seq.
pub struct DeliveryBus {
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl Default for DeliveryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryBus {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Returns the number of receivers the frame reached.
    pub async fn publish(&self, topic: &str, payload: String) -> usize {
        let topics = self.topics.read().await;
        match topics.get(topic) {
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn publish_json<T: serde::Serialize>(&self, topic: &str, value: &T) -> usize {
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Bus serialize error on {}: {:?}", topic, e);
                return 0;
            }
        };
        self.publish(topic, payload).await
    }
}
