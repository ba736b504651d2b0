use serde::Serialize;

use super::ConvType;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserConversation {
    pub user_id: String,
    pub conv_id: String,
    pub conv_type: ConvType,
    pub peer_id: Option<String>,
    pub group_id: Option<String>,
    pub pinned: bool,
    pub muted: bool,
    pub draft: Option<String>,
    pub updated_at: i64,
}

/// One row of the conversation list, unread count included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub conv_id: String,
    pub conv_type: ConvType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub pinned: bool,
    pub muted: bool,
    pub draft: String,
    pub updated_at: i64,
    pub last_seq: i64,
    pub read_seq: i64,
    pub unread: i64,
}
