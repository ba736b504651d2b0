use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::Message;

/// The durable message log. Narrow on purpose: backends other than the
/// relational one (e.g. a document store with native TTL) can be injected at
/// startup without touching the pipeline.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Insert-if-absent keyed on `(conv_id, client_msg_id)`. Returns false
    /// when the key already existed; the stored row is left untouched.
    async fn append(&self, msg: &Message) -> Result<bool>;

    async fn get_by_client_id(&self, conv_id: &str, client_msg_id: &str)
        -> Result<Option<Message>>;

    async fn get_by_server_id(&self, conv_id: &str, server_msg_id: &str)
        -> Result<Option<Message>>;

    async fn get_by_seq(&self, conv_id: &str, seq: i64) -> Result<Option<Message>>;

    /// The persisted end (or error) record of a stream, if it closed already.
    async fn get_stream_end(&self, stream_id: &str) -> Result<Option<Message>>;

    /// Flip `recalled` on; returns false when no row matched.
    async fn recall(&self, conv_id: &str, server_msg_id: &str) -> Result<bool>;

    /// Burn-after-read flip. Matches only `burn_after_read = 1 AND
    /// recalled = 0`, so concurrent readers race to exactly one true result.
    async fn recall_burned(&self, conv_id: &str, seq: i64) -> Result<bool>;

    /// Non-recalled, non-expired messages with `seq > from_seq`, ascending,
    /// capped at `limit`; rows stamped at or before `hide_before_ms` are
    /// filtered out (the caller's delete watermark).
    async fn list(
        &self,
        conv_id: &str,
        from_seq: i64,
        limit: i64,
        hide_before_ms: i64,
        now_ms: i64,
    ) -> Result<Vec<Message>>;

    /// Purge rows whose `expire_at` has passed. Returns the purge count.
    async fn delete_expired(&self, before_ms: i64) -> Result<u64>;
}

const MESSAGE_COLUMNS: &str = "server_msg_id, client_msg_id, conv_id, conv_type, from_user_id, \
     to_user_id, group_id, seq, timestamp, type, payload, recalled, expire_at, burn_after_read, \
     stream_id, stream_seq, stream_status, is_streaming";

#[derive(Clone)]
pub struct SqliteMessageLog {
    pool: SqlitePool,
}

impl SqliteMessageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLog for SqliteMessageLog {
    async fn append(&self, msg: &Message) -> Result<bool> {
        let result = sqlx::query(
            r#"INSERT INTO messages (server_msg_id, client_msg_id, conv_id, conv_type,
                   from_user_id, to_user_id, group_id, seq, timestamp, type, payload,
                   recalled, expire_at, burn_after_read, stream_id, stream_seq,
                   stream_status, is_streaming)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(conv_id, client_msg_id) DO NOTHING"#,
        )
        .bind(&msg.server_msg_id)
        .bind(&msg.client_msg_id)
        .bind(&msg.conv_id)
        .bind(msg.conv_type)
        .bind(&msg.from_user_id)
        .bind(&msg.to_user_id)
        .bind(&msg.group_id)
        .bind(msg.seq)
        .bind(msg.timestamp)
        .bind(&msg.msg_type)
        .bind(&msg.payload)
        .bind(msg.recalled)
        .bind(msg.expire_at)
        .bind(msg.burn_after_read)
        .bind(&msg.stream_id)
        .bind(msg.stream_seq)
        .bind(msg.stream_status)
        .bind(msg.is_streaming)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_client_id(
        &self,
        conv_id: &str,
        client_msg_id: &str,
    ) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conv_id = ? AND client_msg_id = ?"
        );
        let row = sqlx::query_as::<_, Message>(&sql)
            .bind(conv_id)
            .bind(client_msg_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_server_id(
        &self,
        conv_id: &str,
        server_msg_id: &str,
    ) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conv_id = ? AND server_msg_id = ?"
        );
        let row = sqlx::query_as::<_, Message>(&sql)
            .bind(conv_id)
            .bind(server_msg_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_seq(&self, conv_id: &str, seq: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE conv_id = ? AND seq = ?");
        let row = sqlx::query_as::<_, Message>(&sql)
            .bind(conv_id)
            .bind(seq)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_stream_end(&self, stream_id: &str) -> Result<Option<Message>> {
        let sql = format!(
            r#"SELECT {MESSAGE_COLUMNS} FROM messages
               WHERE stream_id = ? AND stream_status IN ('end', 'error') LIMIT 1"#
        );
        let row = sqlx::query_as::<_, Message>(&sql)
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn recall(&self, conv_id: &str, server_msg_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET recalled = 1 WHERE conv_id = ? AND server_msg_id = ?",
        )
        .bind(conv_id)
        .bind(server_msg_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recall_burned(&self, conv_id: &str, seq: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE messages SET recalled = 1
               WHERE conv_id = ? AND seq = ? AND burn_after_read = 1 AND recalled = 0"#,
        )
        .bind(conv_id)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list(
        &self,
        conv_id: &str,
        from_seq: i64,
        limit: i64,
        hide_before_ms: i64,
        now_ms: i64,
    ) -> Result<Vec<Message>> {
        let limit = if limit <= 0 || limit > pulse_shared::constants::HISTORY_PAGE_MAX {
            pulse_shared::constants::HISTORY_PAGE_SIZE
        } else {
            limit
        };
        let sql = format!(
            r#"SELECT {MESSAGE_COLUMNS} FROM messages
               WHERE conv_id = ? AND seq > ? AND recalled = 0
                 AND (expire_at IS NULL OR expire_at > ?)
                 AND timestamp > ?
               ORDER BY seq ASC LIMIT ?"#
        );
        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(conv_id)
            .bind(from_seq)
            .bind(now_ms)
            .bind(hide_before_ms)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete_expired(&self, before_ms: i64) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM messages WHERE expire_at IS NOT NULL AND expire_at <= ?")
                .bind(before_ms)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
