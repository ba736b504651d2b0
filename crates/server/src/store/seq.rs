use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::ConvType;

/// Per-conversation sequence allocator.
///
/// The counter is `conversations.last_seq`, bumped by a single atomic upsert,
/// so two concurrent sends to one conversation can never draw the same value
/// and the value a send draws is the `last_seq` the index reports afterwards.
/// Wall clocks are never involved.
#[derive(Clone)]
pub struct SequenceAllocator {
    pool: SqlitePool,
}

impl SequenceAllocator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn next(
        &self,
        conv_id: &str,
        conv_type: ConvType,
        peer_id: Option<&str>,
        group_id: Option<&str>,
        now_ms: i64,
    ) -> Result<i64> {
        let seq = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO conversations (id, conv_type, peer_id, group_id, last_seq, updated_at)
               VALUES (?, ?, ?, ?, 1, ?)
               ON CONFLICT(id) DO UPDATE
                   SET last_seq = last_seq + 1, updated_at = excluded.updated_at
               RETURNING last_seq"#,
        )
        .bind(conv_id)
        .bind(conv_type)
        .bind(peer_id)
        .bind(group_id)
        .bind(now_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(seq)
    }
}
