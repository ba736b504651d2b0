pub mod bus;
pub mod calls;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod presence;
pub mod ratelimit;
pub mod routes;
pub mod seq_cache;
pub mod store;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use bus::DeliveryBus;
use calls::CallService;
use config::Config;
use pipeline::StreamCoordinator;
use presence::PresenceStore;
use ratelimit::TokenBucketLimiter;
use seq_cache::SeqCache;
use store::{
    ConversationStore, MessageLog, ReceiptStore, RelationStore, SequenceAllocator,
    SqliteMessageLog,
};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub bus: DeliveryBus,
    pub presence: PresenceStore,
    pub limiter: TokenBucketLimiter,
    pub streams: StreamCoordinator,
    pub seq_cache: Arc<SeqCache>,
    pub log: Arc<dyn MessageLog>,
    pub allocator: SequenceAllocator,
    pub conversations: ConversationStore,
    pub receipts: ReceiptStore,
    pub relations: RelationStore,
    pub calls: Option<Arc<dyn CallService>>,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: Config) -> Self {
        let stream_ttl = Duration::from_secs(config.stream_ttl_secs);
        Self {
            bus: DeliveryBus::new(),
            presence: PresenceStore::new(),
            limiter: TokenBucketLimiter::new(),
            streams: StreamCoordinator::new(stream_ttl),
            seq_cache: Arc::new(SeqCache::new(Duration::from_secs(
                pulse_shared::constants::SEQ_CACHE_TTL_SECS,
            ))),
            log: Arc::new(SqliteMessageLog::new(db.clone())),
            allocator: SequenceAllocator::new(db.clone()),
            conversations: ConversationStore::new(db.clone()),
            receipts: ReceiptStore::new(db.clone()),
            relations: RelationStore::new(db.clone()),
            calls: None,
            db,
            config,
        }
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
