use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::now_ms;
use crate::store::MessageLog;
use crate::AppState;

/// Periodic sweep that purges timed self-destruct messages once
/// `expire_at` has passed. A store with native TTL would not need this;
/// the SQL log does.
pub fn spawn_retention_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(state.config.retention_sweep_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state.log.delete_expired(now_ms()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!("Retention sweep purged {} messages", purged),
                Err(e) => tracing::error!("Retention sweep error: {:?}", e),
            }
        }
    })
}
