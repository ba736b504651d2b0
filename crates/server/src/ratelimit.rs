use std::collections::HashMap;

use tokio::sync::Mutex;

/// Idle buckets refill to full anyway; expiring them only bounds memory.
const BUCKET_TTL_MS: i64 = 2_000;
const SWEEP_THRESHOLD: usize = 4_096;

struct Bucket {
    tokens: f64,
    ts_ms: i64,
}

/// Token bucket keyed by a caller-chosen dimension (user:device:action).
/// Refill and take happen under one lock acquisition, so concurrent callers
/// on the same key cannot both spend the last token.
pub struct TokenBucketLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl Default for TokenBucketLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBucketLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Try to take one token; returns `(allowed, remaining_tokens)`.
    pub async fn allow(&self, key: &str, rate_per_sec: i64, burst: i64) -> (bool, i64) {
        self.allow_at(key, rate_per_sec, burst, chrono::Utc::now().timestamp_millis())
            .await
    }

    async fn allow_at(&self, key: &str, rate_per_sec: i64, burst: i64, now_ms: i64) -> (bool, i64) {
        let mut buckets = self.buckets.lock().await;
        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, b| now_ms - b.ts_ms < BUCKET_TTL_MS);
        }

        let burst_f = burst as f64;
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: burst_f,
            ts_ms: now_ms,
        });

        let elapsed = (now_ms - bucket.ts_ms).max(0) as f64 / 1_000.0;
        bucket.tokens = (bucket.tokens + elapsed * rate_per_sec as f64).min(burst_f);
        bucket.ts_ms = now_ms;

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }
        (allowed, bucket.tokens as i64)
    }
}
