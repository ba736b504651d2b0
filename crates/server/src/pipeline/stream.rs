use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::models::ConvType;

/// Transient state for one in-flight streaming message. Only the boundary
/// records (start, end, error) are persisted; chunks ride on the start
/// record's seq with `stream_seq` ordering them inside the stream.
#[derive(Debug, Clone)]
pub struct StreamState {
    pub conv_id: String,
    pub conv_type: ConvType,
    pub from: String,
    pub to: Option<String>,
    pub group_id: Option<String>,
    /// Seq of the persisted start record.
    pub seq: i64,
    pub stream_seq: i64,
    started_at: Instant,
}

pub struct StreamCoordinator {
    streams: Mutex<HashMap<String, StreamState>>,
    ttl: Duration,
}

impl StreamCoordinator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn begin(
        &self,
        stream_id: String,
        conv_id: String,
        conv_type: ConvType,
        from: String,
        to: Option<String>,
        group_id: Option<String>,
        seq: i64,
    ) {
        let state = StreamState {
            conv_id,
            conv_type,
            from,
            to,
            group_id,
            seq,
            stream_seq: 1,
            started_at: Instant::now(),
        };
        self.streams.lock().await.insert(stream_id, state);
    }

    /// Bump the intra-stream counter and return a snapshot, or None when the
    /// stream is unknown or past its TTL.
    pub async fn next_chunk(&self, stream_id: &str) -> Option<StreamState> {
        let mut streams = self.streams.lock().await;
        match streams.get_mut(stream_id) {
            Some(state) if state.started_at.elapsed() < self.ttl => {
                state.stream_seq += 1;
                Some(state.clone())
            }
            Some(_) => {
                streams.remove(stream_id);
                None
            }
            None => None,
        }
    }

    /// Remove and return the state; the stream is over either way.
    pub async fn finish(&self, stream_id: &str) -> Option<StreamState> {
        let mut streams = self.streams.lock().await;
        let state = streams.remove(stream_id)?;
        (state.started_at.elapsed() < self.ttl).then_some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(ttl_ms: u64) -> StreamCoordinator {
        StreamCoordinator::new(Duration::from_millis(ttl_ms))
    }

    #[tokio::test]
    async fn chunk_counter_increments() {
        let c = coordinator(60_000);
        c.begin("s1".into(), "c1".into(), ConvType::C2c, "u1".into(), Some("u2".into()), None, 10)
            .await;
        assert_eq!(c.next_chunk("s1").await.unwrap().stream_seq, 2);
        assert_eq!(c.next_chunk("s1").await.unwrap().stream_seq, 3);
        let end = c.finish("s1").await.unwrap();
        assert_eq!(end.stream_seq, 3);
        assert!(c.next_chunk("s1").await.is_none());
    }

    #[tokio::test]
    async fn unknown_stream_is_rejected() {
        let c = coordinator(60_000);
        assert!(c.next_chunk("nope").await.is_none());
        assert!(c.finish("nope").await.is_none());
    }

    #[tokio::test]
    async fn ttl_expires_state() {
        let c = coordinator(10);
        c.begin("s1".into(), "c1".into(), ConvType::C2c, "u1".into(), Some("u2".into()), None, 1)
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(c.next_chunk("s1").await.is_none());
    }
}
