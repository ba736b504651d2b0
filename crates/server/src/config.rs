use std::env;

use pulse_shared::constants;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Per-(user, device) send rate.
    pub send_qps: i64,
    pub send_burst: i64,
    /// When true, group membership expansion goes through the group_update
    /// queue; otherwise the fan-out engine paginates members itself.
    pub group_fanout_queue: bool,
    pub group_batch_size: usize,
    pub group_batch_sleep_ms: u64,
    pub mark_all_read_chunk_size: usize,
    pub mark_all_read_concurrency: usize,
    pub mark_all_read_retry: u32,
    pub write_deadline_secs: u64,
    pub stream_ttl_secs: u64,
    pub retention_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./pulse.db".into()),
            send_qps: env_i64("SEND_QPS", constants::DEFAULT_SEND_QPS),
            send_burst: env_i64("SEND_BURST", constants::DEFAULT_SEND_BURST),
            group_fanout_queue: env::var("GROUP_FANOUT_QUEUE")
                .map(|v| v == "true" || v == "1" || v == "yes")
                .unwrap_or(true),
            group_batch_size: env_usize("GROUP_BATCH_SIZE", constants::DEFAULT_GROUP_BATCH_SIZE),
            group_batch_sleep_ms: env_u64(
                "GROUP_BATCH_SLEEP_MS",
                constants::DEFAULT_GROUP_BATCH_SLEEP_MS,
            ),
            mark_all_read_chunk_size: env_usize(
                "MARK_ALL_READ_CHUNK_SIZE",
                constants::DEFAULT_MARK_ALL_READ_CHUNK_SIZE,
            ),
            mark_all_read_concurrency: env_usize(
                "MARK_ALL_READ_CONCURRENCY",
                constants::DEFAULT_MARK_ALL_READ_CONCURRENCY,
            ),
            mark_all_read_retry: env::var("MARK_ALL_READ_RETRY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(constants::DEFAULT_MARK_ALL_READ_RETRY),
            write_deadline_secs: env_u64(
                "WRITE_DEADLINE_SECS",
                constants::DEFAULT_WRITE_DEADLINE_SECS,
            ),
            stream_ttl_secs: env_u64("STREAM_TTL_SECS", constants::DEFAULT_STREAM_TTL_SECS),
            retention_sweep_secs: env_u64(
                "RETENTION_SWEEP_SECS",
                constants::DEFAULT_RETENTION_SWEEP_SECS,
            ),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
