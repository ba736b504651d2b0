pub const APP_NAME: &str = "Pulse";

// Limits
pub const MAX_PAYLOAD_BYTES: usize = 16_384;
pub const MAX_CONV_ID_LENGTH: usize = 128;
pub const MAX_CLIENT_MSG_ID_LENGTH: usize = 64;
pub const MAX_DRAFT_LENGTH: usize = 4_000;

/// Message types accepted on the wire.
pub const MESSAGE_TYPES: &[&str] = &[
    "text", "image", "voice", "video", "file", "card", "location", "stream", "custom",
];

pub const HISTORY_PAGE_SIZE: i64 = 50;
pub const HISTORY_PAGE_MAX: i64 = 200;
pub const CONVERSATION_PAGE_SIZE: i64 = 50;
pub const CONVERSATION_PAGE_MAX: i64 = 200;

// Gateway
pub const DEFAULT_SEND_QPS: i64 = 20;
pub const DEFAULT_SEND_BURST: i64 = 40;
pub const DEFAULT_WRITE_DEADLINE_SECS: u64 = 10;
pub const DEFAULT_STREAM_TTL_SECS: u64 = 1_800;

/// Window within which a sender may recall their own message.
pub const RECALL_WINDOW_MS: i64 = 5 * 60 * 1_000;

// Group fan-out
pub const DEFAULT_GROUP_BATCH_SIZE: usize = 500;
pub const DEFAULT_GROUP_BATCH_SLEEP_MS: u64 = 50;

// Mark-all-read
pub const DEFAULT_MARK_ALL_READ_CHUNK_SIZE: usize = 200;
pub const DEFAULT_MARK_ALL_READ_CONCURRENCY: usize = 4;
pub const DEFAULT_MARK_ALL_READ_RETRY: u32 = 3;

pub const SEQ_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_RETENTION_SWEEP_SECS: u64 = 30;
