use sqlx::SqlitePool;

use crate::error::Result;

/// Friendship and group-membership checks injected into the gateway's
/// ingress path. Relationship management itself lives outside the core.
#[derive(Clone)]
pub struct RelationStore {
    pool: SqlitePool,
}

impl RelationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn is_friend(&self, a: &str, b: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM friends
               WHERE (user_id = ? AND friend_id = ?) OR (user_id = ? AND friend_id = ?)"#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn is_member(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Group-wide mute or a member-level mute both deny sending.
    pub async fn is_muted(&self, group_id: &str, user_id: &str) -> Result<bool> {
        let mute_all = sqlx::query_scalar::<_, i64>("SELECT mute_all FROM groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?
            .unwrap_or(0);
        if mute_all != 0 {
            return Ok(true);
        }
        let muted = sqlx::query_scalar::<_, i64>(
            "SELECT muted FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or(0);
        Ok(muted != 0)
    }

    pub async fn list_member_ids(&self, group_id: &str) -> Result<Vec<String>> {
        let ids =
            sqlx::query_scalar::<_, String>("SELECT user_id FROM group_members WHERE group_id = ?")
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}
