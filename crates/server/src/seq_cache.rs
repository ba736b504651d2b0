use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

const SWEEP_THRESHOLD: usize = 65_536;

pub fn last_seq_key(conv_id: &str) -> String {
    format!("lastseq:{conv_id}")
}

pub fn read_seq_key(user_id: &str, conv_id: &str) -> String {
    format!("readseq:{user_id}:{conv_id}")
}

/// Short-TTL cache in front of `conversations.last_seq` and
/// `read_receipts.seq`. The stores stay the source of truth; writes refresh
/// the cached value.
pub struct SeqCache {
    entries: RwLock<HashMap<String, (i64, Instant)>>,
    ttl: Duration,
}

impl SeqCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<i64> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .and_then(|(value, at)| (at.elapsed() < self.ttl).then_some(*value))
    }

    pub async fn put(&self, key: &str, value: i64) {
        let mut entries = self.entries.write().await;
        if entries.len() >= SWEEP_THRESHOLD {
            let ttl = self.ttl;
            entries.retain(|_, (_, at)| at.elapsed() < ttl);
        }
        entries.insert(key.to_string(), (value, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hit_then_expire() {
        let cache = SeqCache::new(Duration::from_millis(50));
        cache.put(&last_seq_key("c1"), 7).await;
        assert_eq!(cache.get(&last_seq_key("c1")).await, Some(7));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&last_seq_key("c1")).await, None);
    }

    #[tokio::test]
    async fn write_refreshes() {
        let cache = SeqCache::new(Duration::from_secs(60));
        cache.put(&read_seq_key("u1", "c1"), 3).await;
        cache.put(&read_seq_key("u1", "c1"), 9).await;
        assert_eq!(cache.get(&read_seq_key("u1", "c1")).await, Some(9));
    }
}
