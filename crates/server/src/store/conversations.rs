use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{ConversationEntry, UserConversation};
use crate::seq_cache::{last_seq_key, read_seq_key, SeqCache};

use super::ReceiptStore;

/// Per-user conversation index: membership rows, pinned/muted/draft flags,
/// delete watermarks, and the unread-count view.
#[derive(Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn last_seq(&self, conv_id: &str) -> Result<i64> {
        let seq = sqlx::query_scalar::<_, i64>("SELECT last_seq FROM conversations WHERE id = ?")
            .bind(conv_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(seq.unwrap_or(0))
    }

    /// Create the user's membership row, or bump its `updated_at`.
    pub async fn upsert_user_conversation(
        &self,
        user_id: &str,
        conv_id: &str,
        conv_type: &str,
        peer_id: Option<&str>,
        group_id: Option<&str>,
        now_ms: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO user_conversations (user_id, conv_id, conv_type, peer_id, group_id, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(user_id, conv_id) DO UPDATE SET updated_at = excluded.updated_at"#,
        )
        .bind(user_id)
        .bind(conv_id)
        .bind(conv_type)
        .bind(peer_id)
        .bind(group_id)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<UserConversation>> {
        let limit = if limit <= 0 || limit > pulse_shared::constants::CONVERSATION_PAGE_MAX {
            pulse_shared::constants::CONVERSATION_PAGE_SIZE
        } else {
            limit
        };
        let rows = sqlx::query_as::<_, UserConversation>(
            r#"SELECT user_id, conv_id, conv_type, peer_id, group_id, pinned, muted, draft, updated_at
               FROM user_conversations WHERE user_id = ?
               ORDER BY updated_at DESC LIMIT ?"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Conversation list with unread counts, served through the seq cache
    /// with store fallback; misses refresh the cache.
    pub async fn list_with_unread(
        &self,
        user_id: &str,
        limit: i64,
        cache: &SeqCache,
        receipts: &ReceiptStore,
    ) -> Result<Vec<ConversationEntry>> {
        let items = self.list_by_user(user_id, limit).await?;
        let mut list = Vec::with_capacity(items.len());
        for it in items {
            let last_seq = match cache.get(&last_seq_key(&it.conv_id)).await {
                Some(v) => v,
                None => {
                    let v = self.last_seq(&it.conv_id).await?;
                    cache.put(&last_seq_key(&it.conv_id), v).await;
                    v
                }
            };
            let read_seq = match cache.get(&read_seq_key(user_id, &it.conv_id)).await {
                Some(v) => v,
                None => {
                    let v = receipts.read_seq(user_id, &it.conv_id).await?;
                    cache.put(&read_seq_key(user_id, &it.conv_id), v).await;
                    v
                }
            };
            list.push(ConversationEntry {
                conv_id: it.conv_id,
                conv_type: it.conv_type,
                peer_id: it.peer_id,
                group_id: it.group_id,
                pinned: it.pinned,
                muted: it.muted,
                draft: it.draft.unwrap_or_default(),
                updated_at: it.updated_at,
                last_seq,
                read_seq,
                unread: (last_seq - read_seq).max(0),
            });
        }
        Ok(list)
    }

    /// Every conversation the user belongs to, paired with its current
    /// last_seq. Feeds mark-all-read.
    pub async fn conv_last_seqs(&self, user_id: &str) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"SELECT uc.conv_id, COALESCE(c.last_seq, 0)
               FROM user_conversations uc
               LEFT JOIN conversations c ON c.id = uc.conv_id
               WHERE uc.user_id = ?"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// True when the user may read this conversation: they hold a membership
    /// row, or it is a group conversation they are a member of.
    pub async fn can_access(&self, user_id: &str, conv_id: &str) -> Result<bool> {
        let has_row = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_conversations WHERE user_id = ? AND conv_id = ?",
        )
        .bind(user_id)
        .bind(conv_id)
        .fetch_one(&self.pool)
        .await?;
        if has_row > 0 {
            return Ok(true);
        }
        let member = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM conversations c
               JOIN group_members gm ON gm.group_id = c.group_id
               WHERE c.id = ? AND gm.user_id = ?"#,
        )
        .bind(conv_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(member > 0)
    }

    pub async fn set_pinned(&self, user_id: &str, conv_id: &str, pinned: bool, now_ms: i64) -> Result<()> {
        sqlx::query(
            "UPDATE user_conversations SET pinned = ?, updated_at = ? WHERE user_id = ? AND conv_id = ?",
        )
        .bind(pinned)
        .bind(now_ms)
        .bind(user_id)
        .bind(conv_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_muted(&self, user_id: &str, conv_id: &str, muted: bool, now_ms: i64) -> Result<()> {
        sqlx::query(
            "UPDATE user_conversations SET muted = ?, updated_at = ? WHERE user_id = ? AND conv_id = ?",
        )
        .bind(muted)
        .bind(now_ms)
        .bind(user_id)
        .bind(conv_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_draft(&self, user_id: &str, conv_id: &str, draft: &str, now_ms: i64) -> Result<()> {
        sqlx::query(
            "UPDATE user_conversations SET draft = ?, updated_at = ? WHERE user_id = ? AND conv_id = ?",
        )
        .bind(draft)
        .bind(now_ms)
        .bind(user_id)
        .bind(conv_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set the owner's delete watermark; earlier history disappears from
    /// their view without touching storage.
    pub async fn set_deleted(&self, owner_id: &str, conv_id: &str, now_ms: i64) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO conv_deletes (owner_id, conv_id, deleted_at) VALUES (?, ?, ?)
               ON CONFLICT(owner_id, conv_id) DO UPDATE SET deleted_at = excluded.deleted_at"#,
        )
        .bind(owner_id)
        .bind(conv_id)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 0 when the owner never deleted this conversation.
    pub async fn deleted_at(&self, owner_id: &str, conv_id: &str) -> Result<i64> {
        let at = sqlx::query_scalar::<_, i64>(
            "SELECT deleted_at FROM conv_deletes WHERE owner_id = ? AND conv_id = ?",
        )
        .bind(owner_id)
        .bind(conv_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(at.unwrap_or(0))
    }
}
